use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::error::Result;

/// Sentinel assigned when the model tier fails. Kept out of the model's label
/// set so degraded batches are distinguishable.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Ordered rule table, tried before the model. First case-sensitive substring
/// match wins. Static configuration, not user-mutable at runtime.
pub const CATEGORY_RULES: &[(&str, &str)] = &[
    ("PIX", "Transferência"),
    ("TED", "Transferência"),
    ("DOC", "Transferência"),
];

/// Model tier of the categorizer. Implementations must be deterministic for
/// identical input and safe to call from multiple threads.
pub trait Classifier: Send + Sync {
    fn classify(&self, description: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Keyword model
// ---------------------------------------------------------------------------

/// Pre-trained keyword weights per label. Array order is the tie-break order,
/// so the artifact is a list rather than a map.
const MODEL_ARTIFACT: &str = r#"[
  {"label": "Alimentação", "keywords": {
    "restaurante": 2.0, "lanchonete": 2.0, "ifood": 2.0, "padaria": 2.0,
    "mercado": 1.5, "supermercado": 2.0, "pizzaria": 2.0, "cafe": 1.0,
    "bar": 1.0, "delivery": 1.0
  }},
  {"label": "Transporte", "keywords": {
    "uber": 2.0, "99app": 2.0, "posto": 1.5, "combustivel": 2.0,
    "gasolina": 2.0, "metro": 1.5, "onibus": 1.5, "estacionamento": 1.5,
    "pedagio": 1.5
  }},
  {"label": "Moradia", "keywords": {
    "aluguel": 2.0, "condominio": 2.0, "energia": 1.5, "luz": 1.0,
    "agua": 1.0, "internet": 1.5, "telefone": 1.0, "iptu": 2.0
  }},
  {"label": "Saúde", "keywords": {
    "farmacia": 2.0, "drogaria": 2.0, "hospital": 2.0, "clinica": 1.5,
    "laboratorio": 1.5, "plano": 1.0, "consulta": 1.5
  }},
  {"label": "Lazer", "keywords": {
    "cinema": 2.0, "netflix": 2.0, "spotify": 2.0, "show": 1.0,
    "viagem": 1.5, "hotel": 1.5, "ingresso": 1.5, "streaming": 1.5
  }},
  {"label": "Renda", "keywords": {
    "salário": 2.0, "salario": 2.0, "rendimento": 1.5, "provento": 1.5,
    "deposito": 1.0, "credito": 0.5
  }},
  {"label": "Compras", "keywords": {
    "amazon": 2.0, "loja": 1.0, "magazine": 1.5, "shopping": 1.0,
    "mercadolivre": 2.0, "shopee": 2.0
  }},
  {"label": "Outros", "keywords": {}}
]"#;

#[derive(Debug, Deserialize)]
struct LabelWeights {
    label: String,
    keywords: HashMap<String, f64>,
}

/// Deterministic text classifier over a fixed label set: tokenizes the
/// description and picks the label with the highest summed keyword weight.
pub struct KeywordModel {
    labels: Vec<LabelWeights>,
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9A-Za-zÀ-ÖØ-öø-ÿ]+").expect("token regex is valid"))
}

impl KeywordModel {
    pub fn embedded() -> Self {
        static LABELS: OnceLock<Vec<LabelWeights>> = OnceLock::new();
        let labels = LABELS.get_or_init(|| {
            serde_json::from_str(MODEL_ARTIFACT).expect("embedded model artifact is valid JSON")
        });
        // Labels are cloned out of the shared artifact so instances stay cheap.
        Self {
            labels: labels
                .iter()
                .map(|l| LabelWeights {
                    label: l.label.clone(),
                    keywords: l.keywords.clone(),
                })
                .collect(),
        }
    }
}

impl Classifier for KeywordModel {
    fn classify(&self, description: &str) -> Result<String> {
        let lowered = description.to_lowercase();
        let tokens: Vec<&str> = token_re().find_iter(&lowered).map(|m| m.as_str()).collect();

        let mut best: Option<(&str, f64)> = None;
        for label in &self.labels {
            let score: f64 = tokens
                .iter()
                .filter_map(|t| label.keywords.get(*t))
                .sum();
            // Strict comparison keeps the earliest label on ties.
            match best {
                Some((_, s)) if score <= s => {}
                _ if score > 0.0 => best = Some((label.label.as_str(), score)),
                _ => {}
            }
        }

        Ok(best
            .map(|(label, _)| label.to_string())
            .unwrap_or_else(|| "Outros".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Two-tier categorizer
// ---------------------------------------------------------------------------

pub struct Categorizer {
    model: Box<dyn Classifier>,
}

impl Categorizer {
    pub fn new(model: Box<dyn Classifier>) -> Self {
        Self { model }
    }

    pub fn with_default_model() -> Self {
        Self::new(Box::new(KeywordModel::embedded()))
    }

    /// Assign a category. Never fails: a model error degrades to the
    /// `Uncategorized` sentinel so one bad row cannot abort a batch.
    pub fn categorize(&self, description: &str) -> String {
        for (pattern, category) in CATEGORY_RULES {
            if description.contains(pattern) {
                return (*category).to_string();
            }
        }
        match self.model.classify(description) {
            Ok(label) => label,
            Err(e) => {
                warn!(error = %e, description = %description, "model tier failed, using sentinel");
                UNCATEGORIZED.to_string()
            }
        }
    }
}
