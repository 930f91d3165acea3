use colored::Colorize;
use indicatif::ProgressBar;

use crate::client::Backend;
use crate::controller::{ControllerError, Ui};
use crate::dom::Document;
use crate::model::{PageState, SaveRequest, Side};
use crate::select;

pub const TICKER_ID: &str = "TckrSymb";
pub const WEEKLY_EXPIRY_ID: &str = "XpryDt1";
pub const DEFAULT_WEEKLY_DISABLED_TICKER: &str = "BANKNIFTY";

pub const LABEL_SAVE: &str = "Save";
pub const LABEL_SAVING: &str = "Saving";
pub const LABEL_SAVED: &str = "Saved";
pub const SAVE_FAILED_ALERT: &str = "Failed to save data.";

#[derive(Clone, Debug)]
pub struct HomeOptions {
    /// Ticker that has no weekly expiry; selecting it disables `#XpryDt1`.
    pub weekly_disabled_ticker: String,
}

impl Default for HomeOptions {
    fn default() -> Self {
        Self {
            weekly_disabled_ticker: DEFAULT_WEEKLY_DISABLED_TICKER.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { message: String },
    /// The trigger was already disabled, a save is in flight.
    Busy,
}

pub struct HomeController<B, U> {
    backend: B,
    ui: U,
    state: PageState,
    options: HomeOptions,
    pb: ProgressBar,
}

impl<B, U> HomeController<B, U>
where
    B: Backend,
    U: Ui,
{
    pub fn new(backend: B, ui: U, state: PageState, options: HomeOptions, pb: ProgressBar) -> Self {
        Self {
            backend,
            ui,
            state,
            options,
            pb,
        }
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn toggle_record(&mut self, expiry: &str, side: Side, index: usize) -> Option<bool> {
        self.state.toggle_record(expiry, side, index)
    }

    pub fn init(&self, doc: &mut Document) -> Result<(), ControllerError> {
        self.update_field_state(doc)
    }

    pub fn on_ticker_change(&self, doc: &mut Document) -> Result<(), ControllerError> {
        self.update_field_state(doc)
    }

    fn update_field_state(&self, doc: &mut Document) -> Result<(), ControllerError> {
        let ticker = doc.get_element_by_id(TICKER_ID)?.value().to_string();
        let weekly = doc.get_element_by_id_mut(WEEKLY_EXPIRY_ID)?;
        weekly.set_disabled(ticker == self.options.weekly_disabled_ticker);
        weekly.set_value("");
        Ok(())
    }

    /// Rows as-is, option chain reduced to the selected records.
    pub fn save_request(&self) -> SaveRequest {
        SaveRequest {
            rows: self.state.rows.clone(),
            toprecords: select::extract_is_selected_records(&self.state.toprecords),
        }
    }

    pub async fn save_eod_summary(
        &mut self,
        doc: &mut Document,
        trigger_id: &str,
    ) -> Result<SaveOutcome, ControllerError> {
        {
            let trigger = doc.get_element_by_id_mut(trigger_id)?;
            if trigger.is_disabled() {
                return Ok(SaveOutcome::Busy);
            }
            trigger.set_text(LABEL_SAVING);
            trigger.set_disabled(true);
        }

        let request = self.save_request();
        self.pb.println(format!(
            "Rows to be saved: {}",
            serde_json::to_string(&request.rows).unwrap_or_else(|_| "[]".to_string())
        ));

        let result = self.backend.save_eod_summary(&request).await;
        let trigger = doc.get_element_by_id_mut(trigger_id)?;
        match result {
            Ok(response) => {
                self.pb
                    .println(format!("Server response: {}", response.message.bold().green()));
                self.ui.alert(&response.message);
                trigger.set_text(LABEL_SAVED);
                Ok(SaveOutcome::Saved {
                    message: response.message,
                })
            }
            Err(e) => {
                self.pb
                    .println(format!("{} {}", "Error saving data:".bold().red(), e));
                self.ui.alert(SAVE_FAILED_ALERT);
                trigger.set_text(LABEL_SAVE);
                trigger.set_disabled(false);
                Err(ControllerError::Save { source: e })
            }
        }
    }
}
