use crate::model::{ExpiryGroup, OptionRecord, OptionsChain, SelectionResult};

/// Keep only the records flagged `isSelectedRecord`, per expiry and side.
/// Every expiry key survives, even when both sides end up empty.
pub fn extract_is_selected_records(chain: &OptionsChain) -> SelectionResult {
    chain
        .iter()
        .map(|(key, group)| {
            let selected = ExpiryGroup {
                strike: group.strike.clone(),
                date: group.date.clone(),
                calls: selected_only(&group.calls),
                puts: selected_only(&group.puts),
            };
            (key.clone(), selected)
        })
        .collect()
}

fn selected_only(records: &[OptionRecord]) -> Vec<OptionRecord> {
    records.iter().filter(|r| r.is_selected).cloned().collect()
}

/// Mark each record with `condition(record strike, strike)`.
pub fn set_is_selected<F>(records: &mut [OptionRecord], strike: f64, condition: F)
where
    F: Fn(f64, f64) -> bool,
{
    for record in records.iter_mut() {
        record.is_selected = condition(record.strike_price, strike);
    }
}

pub fn below_strike(record_strike: f64, strike: f64) -> bool {
    record_strike < strike
}

pub fn above_strike(record_strike: f64, strike: f64) -> bool {
    record_strike > strike
}
