//! Real embedding backend: a BERT encoder with mean-pooling over the
//! attention mask, loaded from a local model directory.
//!
//! This replaces a classifier head with mean pooling because this module
//! produces an embedding to compare, not a label to threshold.

use super::device::select_device;
use super::error::EmbeddingError;
use super::LazyBackend;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use std::path::Path;
use tokenizers::{PaddingParams, Tokenizer};

/// BERT-based encoder. Loads `config.json`, `model.safetensors`, and
/// `tokenizer.json` from a model directory and mean-pools the last hidden
/// state over non-padding tokens.
pub struct BertEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
}

impl BertEncoder {
    /// Loads the model and tokenizer from `model_dir`. Fails fast if any
    /// required file is missing or malformed, or if `dim` does not match
    /// the model's actual hidden size.
    pub fn load(model_dir: &Path, dim: usize) -> Result<Self, EmbeddingError> {
        if !model_dir.is_dir() {
            return Err(EmbeddingError::ModelNotFound {
                path: model_dir.to_path_buf(),
            });
        }

        let config_path = model_dir.join("config.json");
        let weights_path = model_dir.join("model.safetensors");
        let tokenizer_path = model_dir.join("tokenizer.json");

        let config_content = std::fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&config_content).map_err(|e| {
            EmbeddingError::InvalidConfig {
                reason: format!("parsing {}: {e}", config_path.display()),
            }
        })?;

        if config.hidden_size != dim {
            return Err(EmbeddingError::InvalidConfig {
                reason: format!(
                    "model hidden size {} does not match configured dim {dim}",
                    config.hidden_size
                ),
            });
        }

        let mut tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(|e| EmbeddingError::ModelLoadFailed {
                reason: format!("loading tokenizer {}: {e}", tokenizer_path.display()),
            })?;
        tokenizer.with_padding(Some(PaddingParams::default()));

        let device = select_device()?;
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)?
        };
        let model = BertModel::load(vb, &config)?;

        Ok(Self {
            model,
            tokenizer,
            device,
            dim,
        })
    }

    fn mean_pool(&self, hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor, EmbeddingError> {
        let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let masked = hidden.broadcast_mul(&mask)?;
        let summed = masked.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::INFINITY)?;
        Ok(summed.broadcast_div(&counts)?)
    }
}

impl LazyBackend for BertEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbeddingError::TokenizationFailed {
                reason: e.to_string(),
            })?;

        let ids = encoding.get_ids();
        let type_ids = encoding.get_type_ids();
        let mask = encoding.get_attention_mask();

        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(type_ids, &self.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(mask, &self.device)?.unsqueeze(0)?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = self.mean_pool(&hidden, &attention_mask)?;

        let mut values = pooled.squeeze(0)?.to_vec1::<f32>()?;

        let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut values {
                *v /= norm;
            }
        }

        Ok(values)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
