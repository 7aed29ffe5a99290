use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use depot_package::Domain;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// Depot package installer.
///
/// Resolves a package together with its dependencies from local archives
/// and remote catalogs, and installs everything in dependency order.
///
/// EXAMPLES:
///     depot install widget                     Install the newest widget
///     depot install widget --version '^1.2'    Install a matching version
///     depot install ./widget-1.0.0.pkg         Install an archive file
///     depot list                               Show installed packages
///
/// ENVIRONMENT VARIABLES:
///     DEPOT_HOME         Default install directory
///     DEPOT_DOMAIN       Default source domain (local, remote, both)
///     DEPOT_INSTALL_DIR  Install directory override
///     DEPOT_SOURCES      Comma-separated catalog URLs
///     RUST_LOG           Log filter (default: warn)
#[derive(Parser)]
#[command(name = "depot")]
#[command(version)]
struct Cli {
    /// Debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a package and its dependencies
    ///
    /// NAME is a package name or the path to a package archive. Archives in
    /// the current directory are preferred over remote catalogs.
    ///
    /// EXAMPLES:
    ///     depot install widget --domain local      Only use local archives
    ///     depot install widget --pre               Allow a prerelease
    ///     depot install widget --force             Skip packages that fail to download
    #[command(visible_alias = "i", disable_version_flag = true)]
    Install {
        /// Package name or archive path
        name: String,
        /// Version requirement, e.g. '>=1.0, <2'
        #[arg(long = "version", value_name = "REQ")]
        requirement: Option<String>,
        /// Allow prerelease versions of the requested package
        #[arg(long)]
        pre: bool,
        /// Sources to consider: local, remote or both
        #[arg(long)]
        domain: Option<Domain>,
        /// Keep going when a package fails to download
        #[arg(long)]
        force: bool,
        /// Install only the requested package
        #[arg(long)]
        ignore_dependencies: bool,
        /// Do not look up dependencies that are already satisfied
        #[arg(long)]
        minimal_deps: bool,
        /// Also install development dependencies
        #[arg(long)]
        development: bool,
        /// With --development, only the requested package's development dependencies
        #[arg(long)]
        dev_shallow: bool,
        #[arg(long, value_name = "DIR")]
        install_dir: Option<PathBuf>,
        #[arg(long, value_name = "DIR")]
        bin_dir: Option<PathBuf>,
        #[arg(long, value_name = "DIR")]
        cache_dir: Option<PathBuf>,
        /// Install into ~/.depot
        #[arg(long)]
        user_install: bool,
        /// Copy executables instead of writing wrapper scripts
        #[arg(long)]
        no_wrappers: bool,
        /// Rewrite executable shebangs to /usr/bin/env
        #[arg(long)]
        env_shebang: bool,
        /// Name executables using the configured exec-format
        #[arg(long)]
        format_executable: bool,
        /// Remote catalog URL (repeatable); replaces configured sources
        #[arg(long = "source", value_name = "URL")]
        sources: Vec<String>,
        /// Quiet output (errors only)
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// List installed packages
    #[command(visible_alias = "ls")]
    List {
        #[arg(long, value_name = "DIR")]
        install_dir: Option<PathBuf>,
    },

    /// Generate shell completions
    ///
    /// EXAMPLES:
    ///     depot completions bash > ~/.bash_completions/depot.bash
    ///     depot completions zsh > ~/.zfunc/_depot
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Install {
            name,
            requirement,
            pre,
            domain,
            force,
            ignore_dependencies,
            minimal_deps,
            development,
            dev_shallow,
            install_dir,
            bin_dir,
            cache_dir,
            user_install,
            no_wrappers,
            env_shebang,
            format_executable,
            sources,
            quiet,
        } => {
            let args = commands::install::InstallArgs {
                name,
                requirement,
                prerelease: pre,
                domain,
                force,
                ignore_dependencies,
                minimal_deps,
                development,
                dev_shallow,
                install_dir,
                bin_dir,
                cache_dir,
                user_install,
                no_wrappers,
                env_shebang,
                format_executable,
                sources,
                quiet,
            };
            commands::install::run(args)?;
        }
        Commands::List { install_dir } => {
            commands::list::run(commands::list::ListArgs { install_dir })?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }

    Ok(())
}
