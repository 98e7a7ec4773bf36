use serde::{Deserialize, Serialize};

/// One headline's sentiment analysis, as returned by the inference service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub headline: String,
    /// Opaque label chosen by the service ("positive", "negative", ...).
    pub sentiment: String,
    /// Probability-like score in [0, 1]. Not range-checked here.
    pub confidence: f64,
    pub linked_asset: String,
    /// `null` and a missing key both decode to `None`.
    #[serde(default)]
    pub latest_price: Option<f64>,
}

impl Insight {
    pub fn new(
        headline: impl Into<String>,
        sentiment: impl Into<String>,
        confidence: f64,
        linked_asset: impl Into<String>,
        latest_price: Option<f64>,
    ) -> Self {
        Self {
            headline: headline.into(),
            sentiment: sentiment.into(),
            confidence,
            linked_asset: linked_asset.into(),
            latest_price,
        }
    }

    pub fn confidence_pct(&self) -> f64 {
        self.confidence * 100.0
    }

    /// e.g. `positive (82.50%)`
    pub fn sentiment_label(&self) -> String {
        format!("{} ({:.2}%)", self.sentiment, self.confidence_pct())
    }

    pub fn price_label(&self) -> String {
        match self.latest_price {
            Some(p) => format!("${:.2}", p),
            None => "$n/a".to_string(),
        }
    }

    /// Multi-line card used by the insight grid and the custom-result panel.
    pub fn card(&self) -> String {
        format!(
            "Headline: {}\nSentiment: {}\nLinked Asset: {}\nLatest Price: {}",
            self.headline,
            self.sentiment_label(),
            self.linked_asset,
            self.price_label()
        )
    }
}

/// Body of `GET /news-insights`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightListing {
    pub insights: Vec<Insight>,
}

/// Body of `POST /analyze-headline`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub headline: String,
}
