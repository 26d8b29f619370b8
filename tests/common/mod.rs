//! Shared fixtures: a synthetic Telco-shaped dataset and trained artifacts

#![allow(dead_code)]

use churn_mlops::inference::CustomerRecord;
use churn_mlops::preprocessing::{DataPipeline, PipelineConfig};
use churn_mlops::training::{Hyperparameters, ModelType, Trainer, TrainingConfig, TrainingReport};
use churn_mlops::utils::DataSaver;
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};

const YES_NO: [&str; 2] = ["Yes", "No"];
const INTERNET_ADDON: [&str; 3] = ["Yes", "No", "No internet service"];
const MULTIPLE_LINES: [&str; 3] = ["Yes", "No", "No phone service"];
const INTERNET: [&str; 3] = ["DSL", "Fiber optic", "No"];
const CONTRACT: [&str; 3] = ["Month-to-month", "One year", "Two year"];
const PAYMENT: [&str; 4] = [
    "Electronic check",
    "Mailed check",
    "Bank transfer (automatic)",
    "Credit card (automatic)",
];
const GENDER: [&str; 2] = ["Female", "Male"];

fn pick<'a>(rng: &mut ChaCha8Rng, options: &[&'a str]) -> &'a str {
    options[rng.gen_range(0..options.len())]
}

/// The documented example customer: one month on a month-to-month contract
pub fn scenario_record() -> CustomerRecord {
    CustomerRecord {
        gender: "Female".to_string(),
        senior_citizen: 0,
        partner: "Yes".to_string(),
        dependents: "No".to_string(),
        tenure: 1,
        phone_service: "No".to_string(),
        multiple_lines: "No phone service".to_string(),
        internet_service: "DSL".to_string(),
        online_security: "No".to_string(),
        online_backup: "Yes".to_string(),
        device_protection: "No".to_string(),
        tech_support: "No".to_string(),
        streaming_tv: "No".to_string(),
        streaming_movies: "No".to_string(),
        contract: "Month-to-month".to_string(),
        paperless_billing: "Yes".to_string(),
        payment_method: "Electronic check".to_string(),
        monthly_charges: 29.85,
        total_charges: 29.85,
    }
}

/// `n` customers with all 21 Telco columns. Row 0 is [`scenario_record`]
/// labeled "Yes". Rows listed in `blank_total` get a blank TotalCharges,
/// the way new customers appear in the public dataset.
pub fn telco_frame(n: usize, seed: u64, blank_total: &[usize]) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut text: Vec<Vec<String>> = vec![Vec::with_capacity(n); 15];
    let mut ids = Vec::with_capacity(n);
    let mut senior = Vec::with_capacity(n);
    let mut tenure = Vec::with_capacity(n);
    let mut monthly = Vec::with_capacity(n);
    let mut total = Vec::with_capacity(n);
    let mut churn = Vec::with_capacity(n);

    let scenario = scenario_record();
    for i in 0..n {
        ids.push(format!("{:04}-CUST", i));
        if i == 0 {
            let values = [
                &scenario.gender,
                &scenario.partner,
                &scenario.dependents,
                &scenario.phone_service,
                &scenario.multiple_lines,
                &scenario.internet_service,
                &scenario.online_security,
                &scenario.online_backup,
                &scenario.device_protection,
                &scenario.tech_support,
                &scenario.streaming_tv,
                &scenario.streaming_movies,
                &scenario.contract,
                &scenario.paperless_billing,
                &scenario.payment_method,
            ];
            for (col, v) in text.iter_mut().zip(values) {
                col.push(v.clone());
            }
            senior.push(scenario.senior_citizen);
            tenure.push(scenario.tenure);
            monthly.push(scenario.monthly_charges);
            total.push(format!("{:.2}", scenario.total_charges));
            churn.push("Yes".to_string());
            continue;
        }

        let contract = pick(&mut rng, &CONTRACT);
        let months: i64 = rng.gen_range(1..=72);
        let charges: f64 = (rng.gen_range(1800..=11800) as f64) / 100.0;
        let row = [
            pick(&mut rng, &GENDER),
            pick(&mut rng, &YES_NO),
            pick(&mut rng, &YES_NO),
            pick(&mut rng, &YES_NO),
            pick(&mut rng, &MULTIPLE_LINES),
            pick(&mut rng, &INTERNET),
            pick(&mut rng, &INTERNET_ADDON),
            pick(&mut rng, &INTERNET_ADDON),
            pick(&mut rng, &INTERNET_ADDON),
            pick(&mut rng, &INTERNET_ADDON),
            pick(&mut rng, &INTERNET_ADDON),
            pick(&mut rng, &INTERNET_ADDON),
            contract,
            pick(&mut rng, &YES_NO),
            pick(&mut rng, &PAYMENT),
        ];
        for (col, v) in text.iter_mut().zip(row) {
            col.push(v.to_string());
        }
        senior.push(i64::from(rng.gen_bool(0.16)));
        tenure.push(months);
        monthly.push(charges);
        total.push(if blank_total.contains(&i) {
            " ".to_string()
        } else {
            format!("{:.2}", charges * months as f64)
        });

        // Short month-to-month customers churn most
        let mut p: f64 = 0.1;
        if contract == "Month-to-month" {
            p += 0.35;
        }
        if months <= 12 {
            p += 0.25;
        }
        churn.push(if rng.gen_bool(p.min(0.9)) { "Yes" } else { "No" }.to_string());
    }

    let names = [
        "gender",
        "Partner",
        "Dependents",
        "PhoneService",
        "MultipleLines",
        "InternetService",
        "OnlineSecurity",
        "OnlineBackup",
        "DeviceProtection",
        "TechSupport",
        "StreamingTV",
        "StreamingMovies",
        "Contract",
        "PaperlessBilling",
        "PaymentMethod",
    ];
    let mut columns = vec![Column::new("customerID".into(), ids)];
    let mut text = text.into_iter();
    for name in names.iter().take(1) {
        columns.push(Column::new((*name).into(), text.next().unwrap_or_default()));
    }
    columns.push(Column::new("SeniorCitizen".into(), senior));
    for name in names.iter().skip(1).take(2) {
        columns.push(Column::new((*name).into(), text.next().unwrap_or_default()));
    }
    columns.push(Column::new("tenure".into(), tenure));
    for name in names.iter().skip(3) {
        columns.push(Column::new((*name).into(), text.next().unwrap_or_default()));
    }
    columns.push(Column::new("MonthlyCharges".into(), monthly));
    columns.push(Column::new("TotalCharges".into(), total));
    columns.push(Column::new("Churn".into(), churn));

    DataFrame::new(columns).unwrap()
}

pub fn write_raw_csv(df: &DataFrame, path: &Path) {
    let mut df = df.clone();
    DataSaver::save_csv(&mut df, path).unwrap();
}

/// Same frame as a single-sheet workbook; nulls become empty cells
pub fn write_raw_xlsx(df: &DataFrame, path: &Path) {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, column) in df.get_columns().iter().enumerate() {
        let col = col as u16;
        sheet.write_string(0, col, column.name().as_str()).unwrap();
        let series = column.as_materialized_series();
        for row in 0..df.height() {
            let cell = row as u32 + 1;
            match series.get(row).unwrap() {
                AnyValue::Null => {}
                AnyValue::String(s) => {
                    sheet.write_string(cell, col, s).unwrap();
                }
                AnyValue::StringOwned(s) => {
                    sheet.write_string(cell, col, s.as_str()).unwrap();
                }
                other => {
                    sheet.write_number(cell, col, other.extract::<f64>().unwrap()).unwrap();
                }
            }
        }
    }
    workbook.save(path).unwrap();
}

pub fn small_params() -> Hyperparameters {
    Hyperparameters::default()
        .with_n_estimators(15)
        .with_max_depth(Some(4))
}

/// Processed splits and trained artifacts under `root`
pub struct Workspace {
    pub raw: PathBuf,
    pub processed: PathBuf,
    pub models: PathBuf,
    pub report: TrainingReport,
}

pub fn build_workspace(root: &Path, model_type: ModelType, seed: u64) -> Workspace {
    let raw = root.join("raw.csv");
    let processed = root.join("processed");
    let models = root.join("models");
    write_raw_csv(&telco_frame(300, 7, &[]), &raw);

    DataPipeline::new(PipelineConfig::default(), seed)
        .run_file(&raw, &processed)
        .unwrap();

    let config = TrainingConfig::new(model_type).with_params(small_params());
    let report = Trainer::new(config, seed)
        .unwrap()
        .train(&processed, &models, None)
        .unwrap();

    Workspace {
        raw,
        processed,
        models,
        report,
    }
}
