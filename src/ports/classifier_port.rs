//! Text sentiment classifier port.

use crate::domain::error::SentimentError;
use crate::domain::sentiment::{aggregate_classifications, AggregateSentiment, Classification};

pub trait SentimentClassifier {
    /// Classify each text; the output has one entry per input, in order.
    fn classify_batch(&self, texts: &[String]) -> Result<Vec<Classification>, SentimentError>;

    fn aggregate(&self, items: &[Classification]) -> AggregateSentiment {
        aggregate_classifications(items)
    }
}
