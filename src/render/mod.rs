use serde::Serialize;

use crate::dom::Element;
use crate::format::{self, DATE_ATTR, NUMBER_ATTR};
use crate::model::{ExpiryGroup, OptionRecord, OptionsChain, Side};
use crate::summary::SummaryRow;

pub const NO_RECORDS: &str = "No Records Found";

fn caption(side: Side, group: &ExpiryGroup) -> Element {
    Element::new("caption")
        .with_text(format!("{side} Strikes on "))
        .with_child(Element::new("strong").with_text(group.date.clone()))
        .with_text(" for ")
        .with_child(Element::new("b").with_text(group.strike.to_string()))
}

fn header() -> Element {
    Element::new("thead").with_child(
        Element::new("tr")
            .with_child(Element::new("th").with_text("Strike"))
            .with_child(Element::new("th").with_text("EOD OI Change")),
    )
}

fn record_row(record: &OptionRecord) -> Element {
    Element::new("tr")
        .with_child(Element::new("td").with_text(record.strike_price.to_string()))
        .with_child(Element::new("td").with_text(format::format_amount(record.eod_oi_change)))
}

fn empty_row() -> Element {
    Element::new("tr").with_child(
        Element::new("td")
            .with_attr("colspan", "2")
            .with_text(NO_RECORDS),
    )
}

fn option_table(key: &str, side: Side, group: &ExpiryGroup) -> Element {
    let records = group.records(side);
    let mut tbody = Element::new("tbody");
    if records.is_empty() {
        tbody.append(empty_row());
    } else {
        for record in records {
            tbody.append(record_row(record));
        }
    }
    Element::new("table")
        .with_class("option-table")
        .with_attr("id", format!("{key}-{side}"))
        .with_child(caption(side, group))
        .with_child(header())
        .with_child(tbody)
}

/// One CE and one PE table per expiry, wrapped in `div.strikes`.
pub fn generate_tables(chain: &OptionsChain) -> Element {
    let mut container = Element::new("div").with_class("strikes");
    for (key, group) in chain {
        for side in Side::ALL {
            container.append(option_table(key, side, group));
        }
    }
    container
}

const SUMMARY_COLUMNS: &[(&str, &str)] = &[
    ("Expiry", "Expiry"),
    ("TckrSymb", "Symbol"),
    ("FileDt", "File Date"),
    ("Expiry_Date", "Expiry Date"),
    ("Strike", "Strike"),
    ("EOD_CE_OI_Sum", "EOD CE OI"),
    ("EOD_CE_OI_Change_Sum", "EOD CE OI Change"),
    ("ITM_EOD_CE_OI_Sum", "ITM EOD CE OI"),
    ("ITM_EOD_CE_OI_Change_Sum", "ITM EOD CE OI Change"),
    ("EOD_PE_OI_Sum", "EOD PE OI"),
    ("EOD_PE_OI_Change_Sum", "EOD PE OI Change"),
    ("ITM_EOD_PE_OI_Sum", "ITM EOD PE OI"),
    ("ITM_EOD_PE_OI_Change_Sum", "ITM EOD PE OI Change"),
];

fn summary_cell(key: &str, value: &serde_json::Value) -> Element {
    let cell = Element::new("td");
    match value {
        serde_json::Value::Number(n) if key != "Strike" => {
            let raw = n.to_string();
            cell.with_attr(NUMBER_ATTR, raw.clone()).with_text(raw)
        }
        serde_json::Value::String(s) if key == "FileDt" => {
            cell.with_attr(DATE_ATTR, s.clone()).with_text(s.clone())
        }
        serde_json::Value::String(s) => cell.with_text(s.clone()),
        serde_json::Value::Null => cell,
        other => cell.with_text(other.to_string()),
    }
}

/// The home page summary table: one row per expiry, sums shown with
/// Indian grouping and the file date as `Date: dd/mm/yyyy`.
pub fn summary_table(rows: &[SummaryRow]) -> Element {
    let mut head = Element::new("tr");
    for (_, title) in SUMMARY_COLUMNS {
        head.append(Element::new("th").with_text(*title));
    }

    let mut body_rows: Vec<Element> = rows.iter().map(summary_row).collect();
    format::format_table(&mut body_rows);

    let mut tbody = Element::new("tbody");
    for row in body_rows {
        tbody.append(row);
    }

    Element::new("table")
        .with_class("summary-table")
        .with_attr("id", "summary")
        .with_child(Element::new("thead").with_child(head))
        .with_child(tbody)
}

fn summary_row(row: &SummaryRow) -> Element {
    let value = to_value(row);
    let mut tr = Element::new("tr");
    match value.get("Strike") {
        Some(serde_json::Value::Number(n)) => tr.set_attr("data-strike", n.to_string()),
        Some(serde_json::Value::String(s)) => tr.set_attr("data-strike", s.clone()),
        _ => {}
    }
    for (key, _) in SUMMARY_COLUMNS {
        let field = value.get(*key).unwrap_or(&serde_json::Value::Null);
        tr.append(summary_cell(key, field));
    }
    tr
}

fn to_value<T: Serialize>(row: &T) -> serde_json::Value {
    serde_json::to_value(row).unwrap_or(serde_json::Value::Null)
}
