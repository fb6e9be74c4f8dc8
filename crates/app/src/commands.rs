use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use tracing::info;

use conciliar_core::DateRange;
use conciliar_engine::{AuditReport, EngineConfig, ReconciliationSummary, Reconciler};
use conciliar_import::{read_table_file, write_table_file, CsvProfile};

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub bank: PathBuf,
    pub sales: PathBuf,
    pub expenses: PathBuf,
    pub output: PathBuf,
    pub config: Option<PathBuf>,
    pub bank_delimiter: String,
    pub sales_delimiter: String,
    pub expenses_delimiter: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub output: PathBuf,
    pub rows: usize,
    pub period: Option<DateRange>,
    pub summary: ReconciliationSummary,
    pub audit: AuditReport,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    EngineConfig::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))
}

/// Reads the three inputs, reconciles them and writes the output table.
pub fn reconcile_files(request: &RunRequest) -> anyhow::Result<RunOutcome> {
    let config = load_config(request.config.as_deref())?;
    let reconciler = Reconciler::new(config)?;

    let read = |path: &Path, name: &str, delimiter: &str| {
        read_table_file(path, &CsvProfile::new(name, delimiter))
            .with_context(|| format!("reading {name} from {}", path.display()))
    };
    let bank = read(&request.bank, "estado_cuenta", &request.bank_delimiter)?;
    let sales = read(&request.sales, "libro_ventas", &request.sales_delimiter)?;
    let expenses = read(&request.expenses, "registro_egresos", &request.expenses_delimiter)?;
    info!(
        bank_rows = bank.len(),
        sales_rows = sales.len(),
        expense_rows = expenses.len(),
        "inputs loaded"
    );

    let result = reconciler.run(&bank, &sales, &expenses)?;
    write_table_file(&result.table.to_table(), &request.output, &CsvProfile::reconciliation())
        .with_context(|| format!("writing {}", request.output.display()))?;
    info!(path = %request.output.display(), rows = result.table.len(), "output written");

    Ok(RunOutcome {
        output: request.output.clone(),
        rows: result.table.len(),
        period: result.ledger.period(),
        summary: result.table.summary(),
        audit: result.audit,
    })
}

pub fn render_summary(outcome: &RunOutcome) -> String {
    let mut out = String::new();
    let s = &outcome.summary;
    if let Some(period) = outcome.period {
        let _ = writeln!(out, "Periodo: {period}");
    }
    let _ = writeln!(out, "Filas: {} -> {}", outcome.rows, outcome.output.display());
    let _ = writeln!(
        out,
        "Abonos conciliados: {} ({})  pendientes: {} ({})",
        s.credits.reconciled_count,
        s.credits.reconciled_amount,
        s.credits.pending_count,
        s.credits.pending_amount
    );
    let _ = writeln!(
        out,
        "Cargos conciliados: {} ({})  pendientes: {} ({})",
        s.debits.reconciled_count,
        s.debits.reconciled_amount,
        s.debits.pending_count,
        s.debits.pending_amount
    );
    let _ = writeln!(out, "Requieren revisión: {}", s.needs_review);
    for (state, count) in &s.by_state {
        let _ = writeln!(out, "  {state}: {count}");
    }
    if !outcome.audit.is_consistent() {
        let _ = writeln!(
            out,
            "ATENCION: filas bancarias sin reportar {:?}, duplicadas {:?}",
            outcome.audit.missing, outcome.audit.duplicated
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn request(dir: &Path) -> RunRequest {
        RunRequest {
            bank: write(
                dir,
                "banco.csv",
                "Fecha,Oficina,Referencia,Tipo,Descripción,Cargo,Abono,Saldo\n\
                 10/06/2025,0001,00012345,NC,PAGO MOVIL 0102,0,150.00,1150.00\n\
                 11/06/2025,0001,77,NC,DEPOSITO,0,20.00,1170.00\n",
            ),
            sales: write(
                dir,
                "ventas.csv",
                "Nro_Control;Monto_Total;Forma_Pago_1;Fecha_Pago_1;Referencia_1;\
                 Forma_Pago_2;Fecha_Pago_2;Referencia_2\n\
                 F-001;150,00;OTR;10/06/2025;12345;;;\n",
            ),
            expenses: write(dir, "egresos.csv", "TIPO_NOTA,REFERENCIA,NOMBRE,MONTO\n"),
            output: dir.join("conciliacion.csv"),
            config: None,
            bank_delimiter: ",".to_string(),
            sales_delimiter: ";".to_string(),
            expenses_delimiter: ",".to_string(),
        }
    }

    #[test]
    fn reconcile_files_writes_semicolon_output() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = reconcile_files(&request(dir.path())).unwrap();

        assert_eq!(outcome.rows, 2);
        assert!(outcome.audit.is_consistent());
        assert_eq!(outcome.summary.credits.reconciled_count, 1);
        assert_eq!(outcome.summary.credits.pending_count, 1);

        let written = fs::read_to_string(&outcome.output).unwrap();
        let mut lines = written.lines();
        assert_eq!(
            lines.next().unwrap().trim_start_matches('\u{feff}'),
            "Fecha;Referencia;Descripción;Cargo;Abono;SAE (Debe);SAINT (Haber);Estado;Nro_Control"
        );
        assert_eq!(
            lines.next().unwrap(),
            "10/06/2025;00012345;PAGO MOVIL 0102;0.00;150.00;150.00;0.00;Conciliado;F-001"
        );
    }

    #[test]
    fn config_file_overrides_tolerance() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        req.config = Some(write(dir.path(), "conciliar.toml", "amount_tolerance = 0.0\n"));
        let config = load_config(req.config.as_deref()).unwrap();
        assert!(config.amount_tolerance.is_zero());
        assert!(reconcile_files(&req).is_ok());
    }

    #[test]
    fn missing_column_is_reported_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        req.expenses = write(dir.path(), "egresos.csv", "TIPO_NOTA,REFERENCIA,NOMBRE\nX,1,Y\n");
        let err = reconcile_files(&req).unwrap_err();
        assert!(format!("{err:#}").contains("MONTO"));
    }

    #[test]
    fn summary_lists_state_counts() {
        let dir = tempfile::tempdir().unwrap();
        let text = render_summary(&reconcile_files(&request(dir.path())).unwrap());
        assert!(text.contains("Conciliado: 1"));
        assert!(text.contains("Pendiente en Libro: 1"));
        assert!(text.contains("Requieren revisión: 0"));
        assert!(!text.contains("ATENCION"));
    }
}
