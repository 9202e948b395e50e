use atelier_app::domain::ledger::{LedgerService, PgLedgerService, records::VariantAudit};
use clap::Args;
use tabled::{
    Table,
    builder::Builder,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};

#[derive(Debug, Args)]
pub(crate) struct AuditArgs {
    /// Only print variants whose stock diverges from the ledger
    #[arg(long)]
    divergent_only: bool,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn run(args: AuditArgs) -> Result<(), String> {
    let db = super::super::connect(&args.database_url).await?;

    let audits = PgLedgerService::new(db)
        .audit()
        .await
        .map_err(|error| format!("failed to audit ledger: {error}"))?;

    let divergent = audits.iter().filter(|audit| !audit.is_balanced()).count();

    let shown: Vec<&VariantAudit> = audits
        .iter()
        .filter(|audit| !args.divergent_only || !audit.is_balanced())
        .collect();

    println!("{}", audit_table(&shown));
    println!("variants: {}", audits.len());
    println!("divergent: {divergent}");

    if divergent > 0 {
        return Err(format!("{divergent} variant(s) diverge from the stock ledger"));
    }

    Ok(())
}

fn audit_table(audits: &[&VariantAudit]) -> Table {
    let mut builder = Builder::default();

    builder.push_record(["SKU", "Initial", "Movements", "Expected", "Actual", "Divergence"]);

    for audit in audits {
        let reconciliation = &audit.reconciliation;

        builder.push_record([
            audit.sku.clone(),
            reconciliation.initial.to_string(),
            reconciliation.movements.to_string(),
            reconciliation.expected.to_string(),
            reconciliation.actual.to_string(),
            reconciliation.divergence().to_string(),
        ]);
    }

    let mut table = builder.build();

    table.with(Theme::from(Style::modern_rounded()));
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(1..), Alignment::right());

    table
}

#[cfg(test)]
mod tests {
    use atelier::ledger::Reconciliation;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn audit_table_lists_divergence_per_variant() {
        let audit = VariantAudit {
            sku: "CAM-001-AZU-M".to_string(),
            reconciliation: Reconciliation {
                variant: Uuid::nil(),
                initial: 10,
                movements: -3,
                expected: 7,
                actual: 5,
            },
        };

        let rendered = audit_table(&[&audit]).to_string();

        assert!(rendered.contains("CAM-001-AZU-M"));
        assert!(rendered.contains("-2"));
    }
}
