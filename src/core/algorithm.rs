use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Model builders the server exposes under `ModelBuilders/{name}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Glm,
    Gbm,
    Glrm,
    Aggregator,
    DeepLearning,
    Drf,
    IsolationForest,
    KMeans,
    NaiveBayes,
    Pca,
    TargetEncoder,
    Word2Vec,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown algorithm '{0}', expected one of: {}", Algorithm::names().join(", "))]
pub struct AlgorithmError(pub String);

impl Algorithm {
    pub const ALL: [Algorithm; 12] = [
        Algorithm::Glm,
        Algorithm::Gbm,
        Algorithm::Glrm,
        Algorithm::Aggregator,
        Algorithm::DeepLearning,
        Algorithm::Drf,
        Algorithm::IsolationForest,
        Algorithm::KMeans,
        Algorithm::NaiveBayes,
        Algorithm::Pca,
        Algorithm::TargetEncoder,
        Algorithm::Word2Vec,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Glm => "glm",
            Algorithm::Gbm => "gbm",
            Algorithm::Glrm => "glrm",
            Algorithm::Aggregator => "aggregator",
            Algorithm::DeepLearning => "deeplearning",
            Algorithm::Drf => "drf",
            Algorithm::IsolationForest => "isolationforest",
            Algorithm::KMeans => "kmeans",
            Algorithm::NaiveBayes => "naivebayes",
            Algorithm::Pca => "pca",
            Algorithm::TargetEncoder => "targetencoder",
            Algorithm::Word2Vec => "word2vec",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Algorithm::as_str).collect()
    }
}

impl FromStr for Algorithm {
    type Err = AlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|algo| algo.as_str() == s)
            .ok_or_else(|| AlgorithmError(s.to_string()))
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_identifier_round_trips() {
        for algo in Algorithm::ALL {
            assert_eq!(algo.as_str().parse::<Algorithm>(), Ok(algo));
        }
    }

    #[test]
    fn rejects_unknown_and_differently_cased_names() {
        assert_eq!("xgboost".parse::<Algorithm>(), Err(AlgorithmError("xgboost".to_string())));
        assert!("GBM".parse::<Algorithm>().is_err());
    }

    #[test]
    fn error_lists_allowed_names() {
        let msg = AlgorithmError("svm".to_string()).to_string();
        assert!(msg.contains("svm"));
        assert!(msg.contains("word2vec"));
    }
}
