#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

mod args;

use std::env;
use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use log::{debug, error, info, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use x509_cert::Certificate;

use sigtrust::*;

use crate::args::*;

fn configure_logging(args: &SigtrustArgs) {
    if let Some(logging_config) = &args.logging_config {
        match log4rs::init_file(logging_config, Default::default()) {
            Ok(_) => return,
            Err(e) => println!(
                "ERROR: failed to configure logging using {} with {:?}. Continuing with console logging.",
                logging_config, e
            ),
        }
    }

    // if there's no config, prepare one using stdout
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{m}{n}")))
        .build();
    match Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))
    {
        Ok(config) => {
            if let Err(e) = log4rs::init_config(config) {
                println!(
                    "ERROR: failed to configure logging for stdout with {:?}. Continuing without logging.",
                    e
                );
            }
        }
        Err(e) => {
            println!(
                "ERROR: failed to prepare default logging configuration with {:?}. Continuing without logging",
                e
            );
        }
    }
}

fn read_target(env: &ValidationEnvironment, target: &str) -> Result<Certificate> {
    let bytes = get_file_as_byte_vec(Path::new(target))?;
    match env.parse_certificates(&bytes)?.into_iter().next() {
        Some(cert) => Ok(cert),
        None => Err(Error::NotFound),
    }
}

fn prepare_environment(args: &SigtrustArgs) -> Result<ValidationEnvironment> {
    let mut store = CertificateStore::new();
    store.populate_from_folders(
        &DefaultCertificateParser,
        args.trust_anchor_folder.as_deref(),
        args.ca_folder.as_deref(),
    )?;
    if 0 == store.trusted_len() {
        info!("No trusted certificates were provided, validation cannot succeed");
    }

    let mut env = ValidationEnvironment::new(store, Box::new(RustCryptoVerifier));
    env.set_properties(read_properties(&args.properties)?);
    if args.never_fetch {
        env.properties_mut()
            .set_online_fetching(ValidationContexts::all(), OnlineFetching::NeverFetch);
    }
    #[cfg(feature = "remote")]
    if !args.never_fetch {
        env.populate_online_clients();
    }

    if let Some(folder) = &args.ocsp_folder {
        let responses = evidence_folder_to_vec(folder, &OCSP_FILE_EXTENSIONS)?;
        info!("Read {} OCSP responses from {}", responses.len(), folder);
        env.add_ocsp_client(Box::new(StaticOcspClient::new(responses)));
    }
    if let Some(folder) = &args.crl_folder {
        let crls = evidence_folder_to_vec(folder, &CRL_FILE_EXTENSIONS)?;
        info!("Read {} CRLs from {}", crls.len(), folder);
        env.add_crl_client(Box::new(StaticCrlClient::new(crls)));
    }
    Ok(env)
}

fn required_extensions(args: &SigtrustArgs) -> Result<Vec<CertificateExtension>> {
    if args.required_key_usage.is_empty() {
        return Ok(vec![]);
    }
    let names: Vec<&str> = args.required_key_usage.iter().map(String::as_str).collect();
    match KeyUsageExtension::from_names(&names) {
        Ok(ku) => Ok(vec![CertificateExtension::KeyUsage(ku)]),
        Err(e) => {
            error!("Unrecognized key usage in {}", names.join(", "));
            Err(e)
        }
    }
}

fn run(args: &SigtrustArgs) -> Result<ValidationResult> {
    let target = match &args.target {
        Some(t) => t,
        None => {
            error!("A target certificate must be provided using --target");
            return Err(Error::Misconfiguration);
        }
    };

    let env = prepare_environment(args)?;
    let cert = read_target(&env, target)?;
    let required = required_extensions(args)?;
    let toi = TimeOfInterest::from_unix_secs(args.time_of_interest)?;

    let mut context =
        ValidationContext::signer_present().with_certificate_source(args.role.into());
    if args.historical {
        context = context.with_time_basis(TimeBasedContext::Historical);
    }

    let report =
        CertificateChainValidator::new(&env).validate_certificate(context, &cert, toi, &required);
    for item in report.items() {
        info!("{}", item);
    }
    info!("Validation result: {}", report.validation_result());

    if let Some(report_file) = &args.report {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => fs::write(report_file, json)?,
            Err(e) => {
                error!("Failed to serialize validation report: {}", e);
                return Err(Error::ParseError);
            }
        }
    }
    Ok(report.validation_result())
}

/// Point of entry for the sigtrust application.
fn main() -> ExitCode {
    if 1 == env::args_os().len() {
        let mut a = SigtrustArgs::command();
        if let Err(_e) = a.print_help() {
            println!("Error printing help. Try again with -h parameter.")
        }
        return ExitCode::SUCCESS;
    }
    let args = SigtrustArgs::parse();
    configure_logging(&args);
    debug!("sigtrust start");

    let code = match run(&args) {
        Ok(ValidationResult::Valid) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            error!("Validation could not be performed: {}", e);
            ExitCode::from(2)
        }
    };
    debug!("sigtrust end");
    code
}
