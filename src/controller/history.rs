use colored::Colorize;
use indicatif::ProgressBar;

use crate::client::Backend;
use crate::controller::{ControllerError, Ui};
use crate::dom::{Document, Element};
use crate::model::DetailResponse;
use crate::render;

pub const DEFAULT_TICKER_PARAM: &str = "TckrSymb";
pub const DEFAULT_DETAIL_COLSPAN: usize = 11;
pub const DETAIL_CLASS: &str = "strike-detail";
pub const LABEL_LOADING: &str = "Loading";
pub const LOAD_FAILED: &str = "Failed to load data.";

#[derive(Clone, Debug)]
pub struct HistoryOptions {
    pub ticker_param: String,
    /// Width of the cell the detail tables are rendered into.
    pub detail_colspan: usize,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            ticker_param: DEFAULT_TICKER_PARAM.to_string(),
            detail_colspan: DEFAULT_DETAIL_COLSPAN,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetailOutcome {
    /// Backend answered with a message instead of data.
    Message(String),
    Rendered { expiries: usize },
}

pub struct HistoryController<B, U> {
    backend: B,
    ui: U,
    options: HistoryOptions,
    pb: ProgressBar,
}

/// `URLSearchParams.set`: first occurrence replaced in place, later ones
/// dropped, appended when absent.
pub fn set_query_param(url: &mut reqwest::Url, name: &str, value: &str) {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut replaced = false;
    for (k, v) in url.query_pairs() {
        if k == name {
            if !replaced {
                pairs.push((k.into_owned(), value.to_string()));
                replaced = true;
            }
            continue;
        }
        pairs.push((k.into_owned(), v.into_owned()));
    }
    if !replaced {
        pairs.push((name.to_string(), value.to_string()));
    }
    url.query_pairs_mut().clear().extend_pairs(pairs);
}

fn detail_cell(row: &mut Element, colspan: usize) -> &mut Element {
    row.child_or_insert_with(
        |e| e.has_class(DETAIL_CLASS),
        || {
            Element::new("td")
                .with_class(DETAIL_CLASS)
                .with_attr("colspan", colspan.to_string())
        },
    )
}

impl<B, U> HistoryController<B, U>
where
    B: Backend,
    U: Ui,
{
    pub fn new(backend: B, ui: U, options: HistoryOptions, pb: ProgressBar) -> Self {
        Self {
            backend,
            ui,
            options,
            pb,
        }
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    /// Point the page at another ticker and reload it.
    pub fn update_query_param(
        &mut self,
        current_url: &str,
        value: &str,
    ) -> Result<String, ControllerError> {
        let mut url =
            reqwest::Url::parse(current_url).map_err(|_| ControllerError::InvalidPageUrl {
                url: current_url.to_string(),
            })?;
        set_query_param(&mut url, &self.options.ticker_param, value);
        let target = url.to_string();
        self.ui.navigate(&target);
        Ok(target)
    }

    /// Load the per-strike detail into the strike's row. A second call for
    /// the same strike reuses the row's detail cell.
    pub async fn fetch_options_data(
        &mut self,
        doc: &mut Document,
        button_id: &str,
        strike: &str,
    ) -> Result<DetailOutcome, ControllerError> {
        let button_label = doc.get_element_by_id(button_id)?.text_content();
        {
            let row = doc.query_row_by_strike_mut(strike)?;
            detail_cell(row, self.options.detail_colspan).set_text(LABEL_LOADING);
        }
        doc.get_element_by_id_mut(button_id)?
            .set_text(LABEL_LOADING);

        let result = self.backend.get_data(strike).await;

        let outcome = {
            let row = doc.query_row_by_strike_mut(strike)?;
            let cell = detail_cell(row, self.options.detail_colspan);
            match result {
                Ok(DetailResponse::Message { message }) => {
                    cell.clear();
                    cell.append(Element::new("i").with_text(message.clone()));
                    Ok(DetailOutcome::Message(message))
                }
                Ok(DetailResponse::Chain(chain)) => {
                    cell.clear();
                    cell.append(render::generate_tables(&chain));
                    Ok(DetailOutcome::Rendered {
                        expiries: chain.len(),
                    })
                }
                Err(e) => {
                    self.pb
                        .println(format!("{} {}", "Error loading data:".bold().red(), e));
                    cell.set_text(LOAD_FAILED);
                    Err(ControllerError::Detail {
                        strike: strike.to_string(),
                        source: e,
                    })
                }
            }
        };

        doc.get_element_by_id_mut(button_id)?.set_text(button_label);
        outcome
    }
}
