//! Embed a few sentences with the local ONNX model and print their similarities

use treescope_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let temp_dir = tempfile::tempdir()?;
    let config = EmbedConfig::default_with_path(temp_dir.path()).with_batch_size(2);

    println!("Model: {}", config.model_name);
    let provider = FastEmbedProvider::create(config).await?;
    println!("Dimension: {}", provider.embedding_dimension());

    let texts = vec![
        "Northern region sales grew twelve percent.".to_string(),
        "Revenue in the north went up this quarter.".to_string(),
        "Bake the bread at two hundred degrees.".to_string(),
    ];
    let result = provider.embed_texts(&texts).await?;

    for (i, a) in result.embeddings.iter().enumerate() {
        for (j, b) in result.embeddings.iter().enumerate().skip(i + 1) {
            let score: f32 = a.iter().zip(b).map(|(x, y)| x.to_f32() * y.to_f32()).sum();
            println!("{i} vs {j}: {score:.4}");
        }
    }

    Ok(())
}
