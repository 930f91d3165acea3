pub mod history;
pub mod home;

use thiserror::Error;

use crate::client::ClientError;
use crate::dom::DomError;

pub use history::{DetailOutcome, HistoryController, HistoryOptions};
pub use home::{HomeController, HomeOptions, SaveOutcome};

/// What a page can show the user outside the document itself.
pub trait Ui {
    /// Blocking notice, one message per call.
    fn alert(&mut self, message: &str);
    /// Full navigation to `url`.
    fn navigate(&mut self, url: &str);
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Dom(#[from] DomError),

    #[error("failed to save data: {source}")]
    Save {
        #[source]
        source: ClientError,
    },

    #[error("failed to load data for strike {strike}: {source}")]
    Detail {
        strike: String,
        #[source]
        source: ClientError,
    },

    #[error("invalid page URL: {url}")]
    InvalidPageUrl { url: String },
}
