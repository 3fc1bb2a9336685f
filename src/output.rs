//! Console reporting: a colored diagnostic list and a summary table of the
//! rule set the pipeline just compiled. Grounded on the teacher's
//! `comfy-table`/`yansi` pairing for terminal tables (the teacher used the
//! same pair for its `rules`/`check` subcommands).

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use yansi::Paint;

use crate::diagnostics::{Diagnostics, Kind};
use crate::rules::RuleSet;

fn kind_label(kind: Kind) -> String {
    match kind {
        Kind::Input => "input".red().bold().to_string(),
        Kind::Schema => "schema".red().bold().to_string(),
        Kind::Constraint => "constraint".red().bold().to_string(),
        Kind::Emitter => "emitter".red().bold().to_string(),
    }
}

/// Print every diagnostic, one per line, most-informative fields first.
pub fn print_diagnostics(diagnostics: &Diagnostics) {
    for diag in &diagnostics.0 {
        let mut line = format!("[{}] ", kind_label(diag.kind));
        if let Some(file) = &diag.file {
            line.push_str(&format!("{}: ", file.display()));
        }
        if let Some(rule_id) = &diag.rule_id {
            line.push_str(&format!("({rule_id}) "));
        }
        line.push_str(&diag.message);
        eprintln!("{line}");
    }
}

/// A compact per-domain summary of how many rules compiled, shown after a
/// successful run so operators can sanity-check the rule count at a glance.
pub fn rule_summary_table(rule_set: &RuleSet) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["DOMAIN", "RULES", "HAS DEFAULT"]);
    for (domain, indices) in &rule_set.by_domain {
        let has_default = indices.iter().any(|&i| rule_set.rules[i].domain_default);
        table.add_row(vec![
            domain.clone(),
            indices.len().to_string(),
            if has_default { "yes".to_string() } else { "no".to_string() },
        ]);
    }
    table.to_string()
}
