//! Concurrent insert scenario exercising the optimistic commit path
//! (spec.md §5, §8).

use std::sync::Arc;
use std::thread;

use rand::{Rng, SeedableRng};
use vecindex::hnsw::{HnswConfig, HnswIndex, Quantization};

#[test]
fn concurrent_inserts_produce_a_valid_graph() {
    let dim = 16;
    let config = HnswConfig::new(dim as u32, Quantization::F32);
    let index: Arc<HnswIndex<u64>> = Arc::new(HnswIndex::with_seed(config, 99));

    let per_thread = 200;
    let threads = 4;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(t as u64);
                for i in 0..per_thread {
                    let id = (t * per_thread + i) as u64;
                    let v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();

                    match index.prepare_insert(&v, id, id) {
                        Ok(ctx) => match index.try_commit_insert(ctx) {
                            Ok(Some(_)) => {}
                            Ok(None) => {
                                // Lost the optimistic race; fall back to the
                                // locked path, which always succeeds.
                                index.insert(&v, id, id).expect("fallback insert");
                            }
                            Err(e) => panic!("commit failed: {e}"),
                        },
                        Err(e) => panic!("prepare failed: {e}"),
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(index.len(), threads * per_thread);
    let (connected, reciprocal) = index.validate_graph();
    assert_eq!(connected, threads * per_thread);
    assert!(reciprocal);
}

#[test]
fn readers_can_run_while_a_write_is_in_progress() {
    let dim = 8;
    let config = HnswConfig::new(dim as u32, Quantization::F32);
    let index: Arc<HnswIndex<u64>> = Arc::new(HnswIndex::with_seed(config, 3));
    for i in 0..50u64 {
        let v: Vec<f32> = (0..dim).map(|d| (i + d as u64) as f32).collect();
        index.insert(&v, i, i).unwrap();
    }

    let reader_index = Arc::clone(&index);
    let reader = thread::spawn(move || {
        for _ in 0..20 {
            let query = vec![1.0; dim];
            let _ = reader_index.search(&query, 5, None, None);
        }
    });

    for i in 50..100u64 {
        let v: Vec<f32> = (0..dim).map(|d| (i + d as u64) as f32).collect();
        index.insert(&v, i, i).unwrap();
    }

    reader.join().unwrap();
    assert_eq!(index.len(), 100);
}
