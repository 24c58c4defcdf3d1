// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[allow(unused)]
mod app_store_connect;
#[allow(unused)]
mod certificate;
mod error;
#[allow(unused)]
mod import;
#[allow(unused)]
mod placement;
#[allow(unused)]
mod profile;
#[allow(unused)]
mod prompt;
#[allow(unused)]
mod signing_type;
#[allow(unused)]
mod storage;

use {
    crate::{
        app_store_connect::{
            AppStoreConnectClient, CertificateAuthority, ConnectTokenEncoder, UnifiedApiKey,
        },
        error::SigningVaultError,
        import::{ImportConfig, Importer},
        prompt::TerminalPrompt,
        signing_type::SigningType,
        storage::{GitStorage, GitStorageOptions},
    },
    clap::{Arg, ArgMatches, Command},
    log::LevelFilter,
    std::{path::Path, str::FromStr},
};

const IMPORT_ABOUT: &str = "\
Import an existing certificate and private key into versioned storage.

Given a certificate (.cer), its exported private key bundle (.p12), and
optionally a provisioning profile (.mobileprovision for iOS,
.provisionprofile for macOS), this command validates the certificate
against App Store Connect, places the files in the storage repository
under the canonical layout for the given signing type, and commits and
pushes the change.

The certificate must already be registered with the App Store Connect
account: its identifier is derived by matching content against the
account's certificate listing.

Importing without a provisioning profile is supported for repositories
predating profile storage; you will be prompted to confirm.
";

const ENCODE_APP_STORE_CONNECT_API_KEY_ABOUT: &str = "\
Encode all the components of an App Store Connect API Key into a single JSON
file.

App Store Connect API Keys are defined by 3 components: an issuer ID, a key
ID, and the private key itself. Tracking all 3 pieces separately is annoying,
so this command merges them into a single JSON file which the other commands
accept via --api-key-path.
";

fn add_authority_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("api_key_path")
                .long("api-key-path")
                .takes_value(true)
                .allow_invalid_utf8(true)
                .conflicts_with_all(&["api_key_id", "api_issuer_id"])
                .help("Path to a JSON file containing a unified App Store Connect API key"),
        )
        .arg(
            Arg::new("api_key_id")
                .long("api-key-id")
                .takes_value(true)
                .requires("api_issuer_id")
                .help("App Store Connect API Key ID; the AuthKey_<id>.p8 file is searched for in default locations"),
        )
        .arg(
            Arg::new("api_issuer_id")
                .long("api-issuer-id")
                .takes_value(true)
                .requires("api_key_id")
                .help("App Store Connect API Key issuer ID. Likely a UUID"),
        )
}

fn connect_token_from_args(args: &ArgMatches) -> Result<ConnectTokenEncoder, SigningVaultError> {
    if let Some(path) = args.value_of_os("api_key_path") {
        let key = UnifiedApiKey::from_json_path(path)?;

        return ConnectTokenEncoder::try_from(key);
    }

    if let (Some(key_id), Some(issuer_id)) =
        (args.value_of("api_key_id"), args.value_of("api_issuer_id"))
    {
        return ConnectTokenEncoder::from_api_key_id(key_id.to_string(), issuer_id.to_string());
    }

    Err(SigningVaultError::CliGeneralError(
        "specify either --api-key-path or --api-key-id + --api-issuer-id".to_string(),
    ))
}

fn git_storage_from_args(args: &ArgMatches) -> Result<GitStorage, SigningVaultError> {
    let mut options = GitStorageOptions::new(
        args.value_of("git_url")
            .ok_or(SigningVaultError::CliBadArgument)?,
    );

    if let Some(branch) = args.value_of("git_branch") {
        options.branch = branch.to_string();
    }

    options.shallow_clone = args.is_present("shallow_clone");
    options.git_full_name = args.value_of("git_name").map(|x| x.to_string());
    options.git_user_email = args.value_of("git_email").map(|x| x.to_string());

    Ok(GitStorage::configure(options))
}

fn command_import(args: &ArgMatches) -> Result<(), SigningVaultError> {
    let signing_type = SigningType::from_str(
        args.value_of("type")
            .expect("arg should have a default value"),
    )?;

    let cert_path = Path::new(
        args.value_of_os("certificate")
            .expect("arg should have been required"),
    );
    let p12_path = Path::new(
        args.value_of_os("p12")
            .expect("arg should have been required"),
    );
    let profile_path = args.value_of_os("profile").map(Path::new);

    let config = ImportConfig {
        signing_type,
        app_identifier: args.value_of("app_identifier").map(|x| x.to_string()),
    };

    let authority = AppStoreConnectClient::new(connect_token_from_args(args)?)?;
    let mut storage = git_storage_from_args(args)?;
    let prompt = TerminalPrompt;

    let committed = Importer::new(&authority, &mut storage, &prompt).import_certificate(
        &config,
        cert_path,
        p12_path,
        profile_path,
    )?;

    for path in committed {
        println!("{}", path.display());
    }

    Ok(())
}

fn command_list_certificates(args: &ArgMatches) -> Result<(), SigningVaultError> {
    let client = AppStoreConnectClient::new(connect_token_from_args(args)?)?;

    for cert in client.list_certificates()? {
        println!(
            "{}\t{}\t{}",
            cert.id,
            cert.certificate_type.as_deref().unwrap_or("-"),
            cert.display_name.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

fn command_encode_app_store_connect_api_key(args: &ArgMatches) -> Result<(), SigningVaultError> {
    let issuer_id = args
        .value_of("issuer_id")
        .expect("arg should have been required");
    let key_id = args
        .value_of("key_id")
        .expect("arg should have been required");
    let private_key_path = Path::new(
        args.value_of_os("private_key_path")
            .expect("arg should have been required"),
    );

    let unified = UnifiedApiKey::from_ecdsa_pem_path(issuer_id, key_id, private_key_path)?;

    if let Some(output_path) = args.value_of_os("output_path") {
        let output_path = Path::new(output_path);

        eprintln!("writing unified key JSON to {}", output_path.display());
        unified.write_json_file(output_path)?;
        eprintln!(
            "consider auditing the file's access permissions to ensure its content remains secure"
        );
    } else {
        println!("{}", unified.to_json_string()?);
    }

    Ok(())
}

fn main_impl() -> Result<(), SigningVaultError> {
    let app = Command::new("Versioned storage for Apple code signing assets")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Import and manage Apple code signing certificates and profiles in versioned storage")
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .multiple_occurrences(true)
                .help("Increase logging verbosity. Can be specified multiple times."),
        );

    let app = app.subcommand(add_authority_args(
        Command::new("import")
            .about("Import an existing certificate and private key into storage")
            .long_about(IMPORT_ABOUT)
            .arg(
                Arg::new("type")
                    .long("type")
                    .takes_value(true)
                    .possible_values(SigningType::str_names())
                    .default_value("development")
                    .help("Signing type governing where assets land in storage"),
            )
            .arg(
                Arg::new("app_identifier")
                    .long("app-identifier")
                    .takes_value(true)
                    .help("App identifier (bundle id) used to name an imported profile"),
            )
            .arg(
                Arg::new("certificate")
                    .long("certificate")
                    .takes_value(true)
                    .required(true)
                    .allow_invalid_utf8(true)
                    .help("Path to the certificate (.cer, DER or PEM) to import"),
            )
            .arg(
                Arg::new("p12")
                    .long("p12")
                    .takes_value(true)
                    .required(true)
                    .allow_invalid_utf8(true)
                    .help("Path to the private key bundle (.p12) paired with the certificate"),
            )
            .arg(
                Arg::new("profile")
                    .long("profile")
                    .takes_value(true)
                    .allow_invalid_utf8(true)
                    .help("Path to a provisioning profile to import alongside the certificate"),
            )
            .arg(
                Arg::new("git_url")
                    .long("git-url")
                    .takes_value(true)
                    .required(true)
                    .help("URL of the git repository backing the storage"),
            )
            .arg(
                Arg::new("git_branch")
                    .long("git-branch")
                    .takes_value(true)
                    .default_value("master")
                    .help("Branch holding the signing assets"),
            )
            .arg(
                Arg::new("shallow_clone")
                    .long("shallow-clone")
                    .help("Clone the storage repository with --depth 1"),
            )
            .arg(
                Arg::new("git_name")
                    .long("git-name")
                    .takes_value(true)
                    .help("Committer name for the generated commit"),
            )
            .arg(
                Arg::new("git_email")
                    .long("git-email")
                    .takes_value(true)
                    .help("Committer email for the generated commit"),
            ),
    ));

    let app = app.subcommand(add_authority_args(
        Command::new("list-certificates")
            .about("List signing certificates registered with the App Store Connect account"),
    ));

    let app = app.subcommand(
        Command::new("encode-app-store-connect-api-key")
            .about("Encode App Store Connect API Key metadata to a single file")
            .long_about(ENCODE_APP_STORE_CONNECT_API_KEY_ABOUT)
            .arg(
                Arg::new("output_path")
                    .short('o')
                    .long("output-path")
                    .takes_value(true)
                    .allow_invalid_utf8(true)
                    .help("Path to a JSON file to create the output to"),
            )
            .arg(
                Arg::new("issuer_id")
                    .required(true)
                    .help("The issuer of the API Token. Likely a UUID"),
            )
            .arg(
                Arg::new("key_id")
                    .required(true)
                    .help("The Key ID. A short alphanumeric string like DEADBEEF42"),
            )
            .arg(
                Arg::new("private_key_path")
                    .required(true)
                    .allow_invalid_utf8(true)
                    .help("Path to a file containing the private key downloaded from Apple"),
            ),
    );

    let matches = app.get_matches();

    let log_level = match matches.occurrences_of("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    // This spews unwanted output at default level. Nerf it by default.
    if log_level == LevelFilter::Info {
        builder.filter_module("rustls", LevelFilter::Error);
    }

    builder.init();

    match matches.subcommand() {
        Some(("import", args)) => command_import(args),
        Some(("list-certificates", args)) => command_list_certificates(args),
        Some(("encode-app-store-connect-api-key", args)) => {
            command_encode_app_store_connect_api_key(args)
        }
        _ => Err(SigningVaultError::CliUnknownCommand),
    }
}

fn main() {
    let exit_code = match main_impl() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {}", err);
            1
        }
    };

    std::process::exit(exit_code)
}
