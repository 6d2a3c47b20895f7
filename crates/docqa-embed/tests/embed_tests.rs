use docqa_core::traits::Embedder;
use docqa_embed::{get_default_embedder, HashEmbedder, BGE_M3_DIM};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    // Force the hashing embedder to avoid loading the model
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let embedder = get_default_embedder().expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), BGE_M3_DIM);
    assert_eq!(embedder.dim(), BGE_M3_DIM);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn shared_words_are_closer_than_unrelated_text() {
    let embedder = HashEmbedder::new(256);
    let base = embedder.embed("Mud weight raised to 1.25 sg").expect("embed");
    let related = embedder.embed("what was the mud weight").expect("embed");
    let unrelated = embedder.embed("crew change by helicopter").expect("embed");
    assert!(cosine(&base, &related) > cosine(&base, &unrelated));
}

#[test]
fn empty_text_is_a_zero_vector() {
    let v = HashEmbedder::new(8).embed("  ").expect("embed");
    assert_eq!(v, vec![0.0; 8]);
}
