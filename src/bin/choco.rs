use std::sync::Arc;

use anyhow::Result;
use structopt::StructOpt;

use choco_client::types::Config;
use choco_client::{Coordinator, NoopSourceRunner, Notifier, Services, Settings, SourceDispatcher};

#[derive(Debug, StructOpt)]
#[structopt(name = "choco", about = "Package operation orchestrator")]
enum Opts {
    /// Install one or more packages
    Install(PackageArgs),
    /// Upgrade installed packages
    Upgrade(PackageArgs),
    /// Uninstall installed packages
    Uninstall(PackageArgs),
    /// List packages from the configured source
    List(PackageArgs),
    /// Show installed packages with newer versions available
    Outdated(PackageArgs),
    /// Build a package archive from a manifest
    Pack(PackageArgs),
    /// Push a package archive to a source
    Push(PackageArgs),
}

#[derive(Debug, StructOpt)]
struct PackageArgs {
    /// Package names; entries ending in .config are list documents
    packages: Vec<String>,

    #[structopt(long, short = "s", default_value = "")]
    source: String,

    #[structopt(long)]
    version: Option<String>,

    #[structopt(long = "install-arguments", default_value = "")]
    install_arguments: String,

    #[structopt(long = "package-parameters", default_value = "")]
    package_parameters: String,

    /// Include prerelease versions
    #[structopt(long)]
    pre: bool,

    #[structopt(long)]
    force: bool,

    /// Show what would happen without doing it
    #[structopt(long)]
    noop: bool,

    #[structopt(long = "exit-when-reboot-detected")]
    exit_when_reboot_detected: bool,

    #[structopt(long = "stop-on-first-failure")]
    stop_on_first_failure: bool,

    #[structopt(long = "use-enhanced-exit-codes")]
    use_enhanced_exit_codes: bool,

    /// Answer yes to every prompt
    #[structopt(long = "yes", short = "y")]
    confirm: bool,
}

fn build_config(command: &str, args: &PackageArgs) -> Config {
    let mut config = Config::default();
    config.command_name = command.to_string();
    config.package_names = args.packages.join(";");
    config.source = args.source.clone();
    config.version = args.version.clone();
    config.install_arguments = args.install_arguments.clone();
    config.package_parameters = args.package_parameters.clone();
    config.force = args.force;
    config.noop = args.noop;
    config.features.prerelease = args.pre;
    config.features.exit_on_reboot_detected = args.exit_when_reboot_detected;
    config.features.stop_on_first_failure = args.stop_on_first_failure;
    config.features.use_enhanced_exit_codes = args.use_enhanced_exit_codes;
    if args.confirm {
        config.features.prompt_for_confirmation = false;
        config.features.accept_license = true;
    }
    config
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_module_path(false)
        .init();

    let opts = Opts::from_args();
    let (command, args) = match &opts {
        Opts::Install(a) => ("install", a),
        Opts::Upgrade(a) => ("upgrade", a),
        Opts::Uninstall(a) => ("uninstall", a),
        Opts::List(a) => ("list", a),
        Opts::Outdated(a) => ("outdated", a),
        Opts::Pack(a) => ("pack", a),
        Opts::Push(a) => ("push", a),
    };

    let settings = Settings::load_default()?;
    let services = Services::system(&settings);

    // Source backends register here; the default build ships none.
    let dispatcher = SourceDispatcher::new(vec![Arc::new(NoopSourceRunner::new("normal"))]);

    let coordinator = Coordinator::new(settings, dispatcher, services, Notifier::system());
    let config = build_config(command, args);

    std::process::exit(coordinator.run(&config));
}
