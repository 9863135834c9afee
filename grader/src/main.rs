use std::path::Path;
use std::process::ExitCode;
use std::{env, fs};

use grader::llm::provider_from_config;
use grader::pipeline::{Pipeline, PipelineConfig};
use grader::report::GradingReportResponse;
use tracing::{error, info};
use util::config::{self, AppConfig};
use util::logging::init_logging;

const USAGE: &str = "usage: grade <student.puml> <teacher.puml> <problem.txt> [diagram_type]";

fn read(path: &str) -> Result<String, String> {
    fs::read_to_string(Path::new(path)).map_err(|e| format!("failed to read {path}: {e}"))
}

async fn run(args: &[String]) -> Result<GradingReportResponse, String> {
    let [student, teacher, problem, rest @ ..] = args else {
        return Err(USAGE.to_string());
    };
    let diagram_type = rest.first().map(String::as_str);

    let student = read(student)?;
    let teacher = read(teacher)?;
    let problem = read(problem)?;

    let config = AppConfig::global().clone();
    let provider = provider_from_config(&config).map_err(|e| e.to_string())?;
    let pipeline = Pipeline::new(PipelineConfig::from(&config), provider);
    info!(project = %config.project_name, provider = %config.llm_provider, "grader configured");

    let result = pipeline
        .run_named(&student, &teacher, &problem, diagram_type, None)
        .await
        .map_err(|e| e.to_string())?;
    Ok(result.into())
}

#[tokio::main]
async fn main() -> ExitCode {
    let _log_guard = init_logging(&config::log_file());

    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args).await {
        Ok(response) => match serde_json::to_string_pretty(&response) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "failed to serialize report");
                eprintln!("failed to serialize report: {e}");
                ExitCode::FAILURE
            }
        },
        Err(message) => {
            error!(%message, "grading aborted");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}
