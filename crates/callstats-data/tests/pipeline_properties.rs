//! End-to-end behaviour of the aggregation pipeline.

use std::io::Cursor;
use std::path::Path;

use callstats_core::job::JobConfig;
use callstats_core::models::{Dimension, DropReason};
use callstats_core::CallStatsError;
use callstats_data::writer::write_report_to;
use callstats_data::{run_from_reader, PipelineResult};

const HEADER: &str = "Id;Nombre Agente;Origen Corte;Inicio;Tipificación;TalkingTime";

/// A deterministic log with a mix of agents, origins, shifts and days.
fn generated_log(rows: usize) -> Vec<String> {
    let origins = ["Agente", "Cliente", "Agente", "Sistema"];
    let dispositions = ["Venta", "No Disp.", "Rellamar"];
    (0..rows)
        .map(|i| {
            let day = 1 + (i % 5);
            let hour = (i * 7) % 24;
            let minute = (i * 13) % 60;
            format!(
                "{i};MZA {};{};{:02}/12/2024 {:02}:{:02}:00;{};{}",
                10 + i % 4,
                origins[i % origins.len()],
                day,
                hour,
                minute,
                dispositions[i % dispositions.len()],
                (i * 11) % 120,
            )
        })
        .collect()
}

fn log_text(lines: &[String]) -> String {
    let mut text = String::from(HEADER);
    for line in lines {
        text.push('\n');
        text.push_str(line);
    }
    text.push('\n');
    text
}

fn run(text: &str, job: &JobConfig) -> PipelineResult {
    run_from_reader(Cursor::new(text.as_bytes().to_vec()), Path::new("log.csv"), job).unwrap()
}

fn rendered(result: &PipelineResult) -> Vec<u8> {
    let mut out = Vec::new();
    write_report_to(&mut out, &result.report, b';').unwrap();
    out
}

fn single_event(time: &str) -> String {
    log_text(&[format!("1;MZA 12;Agente;03/12/2024 {time};Venta;90")])
}

#[test]
fn reports_are_identical_across_batch_sizes() {
    let lines = generated_log(137);
    let text = log_text(&lines);

    for preset in ["agent-shift", "shift-daily", "long-calls", "agent-daily"] {
        let mut job = JobConfig::preset(preset).unwrap();
        job.batch_size = lines.len();
        let reference = run(&text, &job);
        let reference_bytes = rendered(&reference);

        for batch_size in [1, 10] {
            job.batch_size = batch_size;
            let result = run(&text, &job);
            assert_eq!(result.table, reference.table, "{preset} @ {batch_size}");
            assert_eq!(rendered(&result), reference_bytes, "{preset} @ {batch_size}");
            assert_eq!(result.diagnostics.dropped, reference.diagnostics.dropped);
        }

        // Repeat run.
        job.batch_size = lines.len();
        assert_eq!(rendered(&run(&text, &job)), reference_bytes);
    }
}

#[test]
fn input_order_does_not_change_counts() {
    let lines = generated_log(80);
    let mut reversed = lines.clone();
    reversed.reverse();

    let mut job = JobConfig::preset("agent-shift").unwrap();
    job.batch_size = 7;
    let forward = run(&log_text(&lines), &job);
    let backward = run(&log_text(&reversed), &job);

    assert_eq!(forward.table, backward.table);
    assert_eq!(forward.report, backward.report);
}

#[test]
fn fixed_window_boundaries() {
    let job = JobConfig::preset("shift-daily").unwrap();
    let cases = [
        ("09:00:00", "Cantidad Mañana"),
        ("14:30:00", "Cantidad Mañana"),
        ("14:31:00", "Cantidad Fuera de Rango"),
        ("15:00", "Cantidad Tarde"),
        ("20:00:00", "Cantidad Tarde"),
        ("20:01:00", "Cantidad Fuera de Rango"),
    ];
    for (time, column) in cases {
        let result = run(&single_event(time), &job);
        assert_eq!(
            result.report.value(&["03/12/2024"], column),
            Some(1),
            "{time} should land in {column}"
        );
    }
}

#[test]
fn binned_boundaries() {
    let job = JobConfig::preset("agent-shift").unwrap();
    let cases = [
        ("09:00:00", "Cortes Turno Mañana"),
        ("14:31:00", "Cortes Turno Mañana"),
        ("15:00:00", "Cortes Turno Tarde"),
        ("20:59:00", "Cortes Turno Tarde"),
    ];
    for (time, column) in cases {
        let result = run(&single_event(time), &job);
        assert_eq!(
            result.report.value(&["MZA 12"], column),
            Some(1),
            "{time} should land in {column}"
        );
    }

    for time in ["08:59:00", "21:00:00"] {
        let result = run(&single_event(time), &job);
        assert!(result.report.rows.is_empty(), "{time} is not retained");
        assert_eq!(result.diagnostics.rows_counted, 0);
    }
}

#[test]
fn client_drops_are_not_counted() {
    let text = log_text(&[
        "1;MZA 12;Cliente;03/12/2024 10:00:00;Venta;5".to_string(),
        "2;MZA 12;Cliente;03/12/2024 16:00:00;Venta;5".to_string(),
        "3;MZA 13;Agente;03/12/2024 16:00:00;Venta;5".to_string(),
    ]);
    let result = run(&text, &JobConfig::preset("agent-drops").unwrap());

    assert_eq!(result.report.value(&["MZA 12"], "Cantidad de Cortes"), None);
    assert_eq!(result.report.value(&["MZA 13"], "Cantidad de Cortes"), Some(1));
    assert_eq!(
        result.diagnostics.dropped_for(DropReason::DropOriginMismatch),
        2
    );
}

#[test]
fn pivot_columns_are_zero_filled() {
    let text = log_text(&["1;MZA 12;Agente;03/12/2024 10:00:00;Venta;5".to_string()]);
    let result = run(&text, &JobConfig::preset("agent-shift").unwrap());

    assert_eq!(
        result.report.columns,
        vec!["Cortes Turno Mañana", "Cortes Turno Tarde"]
    );
    assert_eq!(result.report.rows[0].values, vec![1, 0]);
}

#[test]
fn total_row_matches_column_sums() {
    let mut job = JobConfig::preset("agent-shift").unwrap();
    job.total_row = true;
    job.total_column = true;
    let result = run(&log_text(&generated_log(200)), &job);
    let report = &result.report;

    let total = report.total_row.as_ref().unwrap();
    for (col, label) in report.columns.iter().enumerate() {
        let sum: u64 = report.rows.iter().map(|r| r.values[col]).sum();
        assert_eq!(total.values[col], sum, "column {label}");
    }
    for row in &report.rows {
        let (total_cell, cells) = row.values.split_last().unwrap();
        assert_eq!(*total_cell, cells.iter().sum::<u64>());
    }
    assert_eq!(*total.values.last().unwrap(), result.table.total());
}

#[test]
fn fully_pivoted_total_row_is_labelled() {
    let mut job = JobConfig::preset("shift-distribution").unwrap();
    job.pivot = Some(Dimension::Shift);
    job.total_row = true;
    let text = "Inicio\n03/12/2024 10:00:00\n03/12/2024 16:00:00\n";
    let result = run(text, &job);

    let written = String::from_utf8(rendered(&result)).unwrap();
    assert_eq!(
        written,
        ";Mañana;Tarde;Fuera de Rango\n\
         Cantidad;1;1;0\n\
         Total;1;1;0\n"
    );
}

#[test]
fn latin1_bytes_in_unused_columns_do_not_drop_rows() {
    let mut data = b"Nombre Agente;Origen Corte;Inicio;Comentario\n".to_vec();
    data.extend_from_slice(b"MZA 12;Agente;03/12/2024 10:00:00;caf\xe9\n");
    data.extend_from_slice(b"MZA \xd1;Agente;03/12/2024 10:00:00;ok\n");
    let job = JobConfig::preset("agent-drops").unwrap();
    let result = run_from_reader(Cursor::new(data), Path::new("log.csv"), &job).unwrap();

    assert_eq!(result.diagnostics.rows_counted, 1);
    assert_eq!(
        result.diagnostics.dropped_for(DropReason::MalformedRecord),
        1
    );
    assert_eq!(result.report.value(&["MZA 12"], "Cantidad de Cortes"), Some(1));
}

#[test]
fn daily_agents_pivots_agents_with_daily_total() {
    let text = log_text(&[
        "1;MZA 13;Agente;04/12/2024 10:00:00;Venta;5".to_string(),
        "2;MZA 12;Agente;03/12/2024 10:00:00;Venta;5".to_string(),
        "3;MZA 12;Agente;03/12/2024 22:00:00;Venta;5".to_string(),
        "4;MZA 13;Cliente;03/12/2024 11:00:00;Venta;5".to_string(),
    ]);
    let result = run(&text, &JobConfig::preset("daily-agents").unwrap());

    let written = String::from_utf8(rendered(&result)).unwrap();
    assert_eq!(
        written,
        "Fecha;MZA 12;MZA 13;Total\n\
         03/12/2024;2;0;2\n\
         04/12/2024;0;1;1\n"
    );
}

#[test]
fn bad_timestamp_is_dropped_and_run_continues() {
    let text = log_text(&[
        "1;MZA 12;Agente;03/12/2024 10:00:00;Venta;5".to_string(),
        "2;MZA 12;Agente;32/12/2024 10:00:00;Venta;5".to_string(),
        "3;MZA 12;Agente;03/12/2024 11:00:00;Venta;5".to_string(),
    ]);
    let job = JobConfig::preset("agent-drops").unwrap();
    let result = run(&text, &job);

    assert_eq!(
        result.diagnostics.dropped_for(DropReason::InvalidTimestamp),
        1
    );
    assert_eq!(result.diagnostics.invalid_samples, vec!["32/12/2024 10:00:00"]);
    assert_eq!(result.report.value(&["MZA 12"], "Cantidad de Cortes"), Some(2));
    assert_eq!(
        result.diagnostics.rows_counted + result.diagnostics.rows_dropped(),
        result.diagnostics.rows_read
    );
}

#[test]
fn missing_required_column_fails_before_rows() {
    // Rows are not even well-formed; resolution must fail first.
    let text = "Nombre Agente;Inicio\n\u{1}\u{2};;;;;\n";
    let job = JobConfig::preset("agent-drops").unwrap();
    let err = run_from_reader(Cursor::new(text.as_bytes()), Path::new("log.csv"), &job)
        .unwrap_err();

    match err {
        CallStatsError::SchemaResolution { keyword, headers, .. } => {
            assert_eq!(keyword, "Origen Corte");
            assert_eq!(headers, vec!["Nombre Agente", "Inicio"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn month_filter_and_agent_list() {
    let text = log_text(&[
        "1;MZA 33;Agente;30/11/2024 10:00:00;Venta;5".to_string(),
        "2;MZA 33;Agente;03/12/2024 10:00:00;Venta;5".to_string(),
        "3;MZA 99;Agente;03/12/2024 10:00:00;Venta;5".to_string(),
    ]);
    let mut job = JobConfig::preset("agent-shift").unwrap();
    job.filters.month = Some(12);
    job.filters.allowed_agents = Some(vec!["MZA 33".to_string()]);
    let result = run(&text, &job);

    assert_eq!(result.report.rows.len(), 1);
    assert_eq!(result.report.value(&["MZA 33"], "Cortes Turno Mañana"), Some(1));
    assert_eq!(result.diagnostics.dropped_for(DropReason::MonthMismatch), 1);
    assert_eq!(result.diagnostics.dropped_for(DropReason::AgentNotAllowed), 1);
}
