use std::fs;

use chrono::Local;
use tracing::{debug, info, warn};

use xnatdl::api;
use xnatdl::core::filter::parse_option_list;
use xnatdl::core::params::DownloadParams;
use xnatdl::core::report::COMMAND_LINE_NAME;
use xnatdl::io::writers::{render_command_line, write_command_file};
use xnatdl::io::{XnatClient, XnatCredentials};

use super::args::CliArgs;
use super::errors::AppError;

const BANNER_WIDTH: usize = 32;

/// Shorten a value for the banner: paths keep their end, other values their start
pub fn get_proper_str(value: &str, is_path: bool) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= BANNER_WIDTH {
        return value.to_string();
    }
    let keep = BANNER_WIDTH - 3;
    if is_path {
        format!("...{}", chars[chars.len() - keep..].iter().collect::<String>())
    } else {
        format!("{}...", chars[..keep].iter().collect::<String>())
    }
}

fn banner_line(name: &str, value: Option<&str>, is_path: bool) {
    if let Some(value) = value {
        println!("  {:<28}: {}", name, get_proper_str(value, is_path));
    }
}

fn print_banner(args: &CliArgs) {
    let path = |p: &Option<std::path::PathBuf>| p.as_ref().map(|p| p.display().to_string());
    let flag = |b: bool| if b { Some("on") } else { None };

    println!("################################################################");
    println!("#                        XNATDOWNLOAD                          #");
    println!("#                                                              #");
    println!("# Download scans and assessor resources from XNAT, optionally  #");
    println!("# converted to BIDS.                                           #");
    println!("################################################################");
    println!("Parameters:");
    banner_line("XNAT host", args.host.as_deref(), false);
    banner_line("XNAT user", args.username.as_deref(), false);
    banner_line("Project(s)", args.project.as_deref(), false);
    banner_line("Directory", path(&args.directory).as_deref(), true);
    banner_line("One directory", flag(args.one_directory), false);
    banner_line("Subject(s)", args.subjects.as_deref(), false);
    banner_line("Session(s)", args.sessions.as_deref(), false);
    banner_line("Scan types", args.scan_types.as_deref(), false);
    banner_line("Excluded scan types", args.without_scan_types.as_deref(), false);
    banner_line("Scan resources", args.scan_resources.as_deref(), false);
    banner_line("Quality", args.quality.as_deref(), false);
    banner_line("Assessor types", args.assessor_types.as_deref(), false);
    banner_line("Excluded assessor types", args.without_assessor_types.as_deref(), false);
    banner_line("Assessor resources", args.assessor_resources.as_deref(), false);
    banner_line("Proc status", args.status.as_deref(), false);
    banner_line("QC status", args.qcstatus.as_deref(), false);
    banner_line("Input CSV", path(&args.csv_file).as_deref(), true);
    banner_line("Selected scan", args.selection_scan.as_deref(), false);
    banner_line("Selected assessor", args.selection_assessor.as_deref(), false);
    banner_line("Overwrite", flag(args.overwrite), false);
    banner_line("Update", flag(args.update), false);
    banner_line("Full regex", flag(args.full_regex), false);
    banner_line("Ignore report", flag(args.ignore_report), false);
    banner_line("BIDS directory", path(&args.bids_dir).as_deref(), true);
    banner_line("Log file", path(&args.output).as_deref(), true);
    println!("################################################################");
}

/// Validate the option combination; returns warnings to log once logging is up
pub fn check_options(args: &CliArgs) -> Result<Vec<String>, AppError> {
    let mut warnings = Vec::new();

    let directory = args.directory.as_ref().ok_or(AppError::MissingArgument {
        arg: "-d/--directory".to_string(),
    })?;

    if args.bids && args.bids_dir.is_none() {
        return Err(AppError::MissingArgument {
            arg: "--bids_dir (required with -b/--bids)".to_string(),
        });
    }

    if let Some(csv) = &args.csv_file {
        if !csv.is_file() {
            return Err(AppError::MissingCsv { path: csv.clone() });
        }
        return Ok(warnings);
    }

    let has_selection = args.selection_scan.is_some() || args.selection_assessor.is_some();
    if args.project.is_none() && !has_selection {
        return Err(AppError::MissingArgument {
            arg: "-p/--project".to_string(),
        });
    }
    if args.update && !directory.is_dir() {
        return Err(AppError::NothingToUpdate {
            path: directory.clone(),
        });
    }
    if args.overwrite && args.update {
        return Err(AppError::OverwriteAndUpdate);
    }

    let scan_wanted = args.scan_types.is_some()
        || args.without_scan_types.is_some()
        || args.selection_scan.is_some();
    let assessor_wanted = args.assessor_types.is_some()
        || args.without_assessor_types.is_some()
        || args.selection_assessor.is_some();
    if scan_wanted && args.scan_resources.is_none() {
        return Err(AppError::MissingResources {
            what: "Scans",
            flag: "--rs",
        });
    }
    if assessor_wanted && args.assessor_resources.is_none() {
        return Err(AppError::MissingResources {
            what: "Assessors",
            flag: "--ra",
        });
    }
    if !scan_wanted && !assessor_wanted {
        return Err(AppError::NothingSelected);
    }
    if args.scan_resources.is_some() && !scan_wanted {
        return Err(AppError::ResourcesWithoutTypes {
            flag: "--rs",
            types: "-s/--scantype, --WOS or --selectionS",
        });
    }
    if args.assessor_resources.is_some() && !assessor_wanted {
        return Err(AppError::ResourcesWithoutTypes {
            flag: "--ra",
            types: "-a/--assessortype, --WOP or --selectionP",
        });
    }

    if let Some(wos) = &args.without_scan_types {
        warnings.push(format!("Scan types excluded from the download: {}", wos));
    }
    if let Some(wop) = &args.without_assessor_types {
        warnings.push(format!("Assessor types excluded from the download: {}", wop));
    }
    if args.bids_dir.is_some() && !args.bids {
        warnings.push("--bids_dir given without -b/--bids, no BIDS conversion".to_string());
    }
    Ok(warnings)
}

/// Typed download parameters from validated arguments
pub fn to_params(args: &CliArgs) -> Result<DownloadParams, AppError> {
    let directory = args.directory.clone().ok_or(AppError::MissingArgument {
        arg: "-d/--directory".to_string(),
    })?;
    let projects = args
        .project
        .as_deref()
        .map(|p| {
            p.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(DownloadParams {
        directory,
        projects,
        subjects: parse_option_list(args.subjects.as_deref()),
        sessions: parse_option_list(args.sessions.as_deref()),
        scan_types: parse_option_list(args.scan_types.as_deref()),
        without_scan_types: parse_option_list(args.without_scan_types.as_deref()),
        qualities: parse_option_list(args.quality.as_deref()),
        scan_resources: parse_option_list(args.scan_resources.as_deref()),
        assessor_types: parse_option_list(args.assessor_types.as_deref()),
        without_assessor_types: parse_option_list(args.without_assessor_types.as_deref()),
        proc_status: parse_option_list(args.status.as_deref()),
        qc_status: parse_option_list(args.qcstatus.as_deref()),
        assessor_resources: parse_option_list(args.assessor_resources.as_deref()),
        csv_file: args.csv_file.clone(),
        selection_scan: args.selection_scan.clone(),
        selection_assessor: args.selection_assessor.clone(),
        one_dir: args.one_directory,
        overwrite: args.overwrite,
        update: args.update,
        full_regex: args.full_regex,
        ignore_report: args.ignore_report,
        bids_dir: if args.bids { args.bids_dir.clone() } else { None },
    })
}

fn command_line() -> String {
    let program = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "xnatdownload".to_string());
    let rest = render_command_line(std::env::args().skip(1));
    if rest.is_empty() {
        program
    } else {
        format!("{} {}", program, rest)
    }
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    print_banner(&args);
    let warnings = check_options(&args)?;
    xnatdl::logging::init(args.output.as_deref(), args.debug)?;
    for w in &warnings {
        warn!("{}", w);
    }

    let params = to_params(&args)?;
    debug!("Download parameters: {}", serde_json::to_string(&params)?);

    fs::create_dir_all(&params.directory)?;
    write_command_file(
        &params.directory.join(COMMAND_LINE_NAME),
        &command_line(),
        params.overwrite,
    )?;

    let credentials = XnatCredentials::resolve(args.host.as_deref(), args.username.as_deref())?;
    info!("Connecting to XNAT at {}", credentials.host);
    let client = XnatClient::connect(&credentials)?;

    let summary = api::run_download(&client, &params, &Local::now())?;

    api::convert_downloaded(&client, &params, &summary);

    info!("===================================================================");
    Ok(())
}
