use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::options::{BuildRequest, ServeRequest};

#[derive(Parser, Debug)]
#[command(name = "ojet")]
#[command(version)]
#[command(about = "Oracle JET build, serve and component tooling")]
pub struct Cli {
    /// Log debug output, including Exchange requests
    #[arg(long, global = true)]
    pub verbose: bool,
    /// Application root (defaults to the current directory)
    #[arg(long = "project-dir", global = true, value_name = "DIR")]
    pub project_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the application for a platform
    Build(BuildArgs),
    /// Build, then serve the application with optional livereload
    Serve(ServeArgs),
    /// Clean the staging directory or the cordova platform
    Clean(CleanArgs),
    /// Add components, packs or the sass compiler
    #[command(subcommand)]
    Add(AddCommand),
    /// Remove components or packs
    #[command(subcommand)]
    Remove(RemoveCommand),
    /// Create a local pack
    #[command(subcommand)]
    Create(CreateCommand),
    /// Publish a component or pack to the Exchange
    #[command(subcommand)]
    Publish(PublishCommand),
    /// List components or packs known to the project
    #[command(subcommand)]
    List(ListCommand),
    /// Search the Exchange
    #[command(subcommand)]
    Search(SearchCommand),
    /// Store project settings in oraclejetconfig.json
    Configure(ConfigureArgs),
    /// Remove files ignored by the application's .gitignore
    Strip,
    /// Manage ojet tool configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Target platform (web, android, ios, windows)
    pub platform: Option<String>,
    /// Shorthand for --build-type=release
    #[arg(long)]
    pub release: bool,
    /// Build type: dev, debug or release
    #[arg(long = "build-type", value_name = "TYPE")]
    pub build_type: Option<String>,
    /// Theme as name[:platform]
    #[arg(long)]
    pub theme: Option<String>,
    /// Comma separated extra themes, or `all`
    #[arg(long)]
    pub themes: Option<String>,
    /// Build destination (emulator, device)
    #[arg(long)]
    pub destination: Option<String>,
    /// Cordova build config file
    #[arg(long = "build-config", value_name = "PATH")]
    pub build_config: Option<String>,
    /// Options passed through to the cordova platform
    #[arg(long = "platform-options", allow_hyphen_values = true)]
    pub platform_options: Option<String>,
    /// Skip sass compilation
    #[arg(long = "no-sass")]
    pub no_sass: bool,
    /// Build a single local component instead of the application
    #[arg(long)]
    pub component: Option<String>,
    /// Free-form value handed to hooks
    #[arg(long = "user-options", allow_hyphen_values = true)]
    pub user_options: Option<String>,
}

impl BuildArgs {
    pub fn request(&self) -> BuildRequest {
        BuildRequest {
            platform: self.platform.clone(),
            build_type: self.build_type.clone(),
            release: self.release,
            theme: self.theme.clone(),
            themes: self.themes.clone(),
            destination: self.destination.clone(),
            build_config: self.build_config.clone(),
            platform_options: self.platform_options.clone(),
            no_sass: self.no_sass,
            user_options: self.user_options.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub build: BuildArgs,
    /// Web server port
    #[arg(long = "server-port", alias = "port", value_name = "PORT")]
    pub port: Option<String>,
    /// Livereload notifier port
    #[arg(long = "livereload-port", value_name = "PORT")]
    pub livereload_port: Option<String>,
    /// Disable livereload
    #[arg(long = "no-livereload")]
    pub no_livereload: bool,
    /// Serve without building first
    #[arg(long = "no-build")]
    pub no_build: bool,
    /// Start the server without launching a browser or device
    #[arg(long = "server-only")]
    pub server_only: bool,
    /// Browser for hybrid serve to the browser platform
    #[arg(long)]
    pub browser: Option<String>,
}

impl ServeArgs {
    pub fn request(&self) -> ServeRequest {
        ServeRequest {
            build: self.build.request(),
            skip_build: self.no_build,
            livereload: self.no_livereload.then_some(false),
            port: self.port.clone(),
            livereload_port: self.livereload_port.clone(),
            server_only: self.server_only,
            browser: self.browser.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Platform to clean
    pub platform: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum AddCommand {
    /// Add Exchange components (name[@version])
    Component(AddComponentArgs),
    /// Add Exchange packs (name[@version])
    Pack(NamesArgs),
    /// Install the sass compiler into the application
    Sass,
}

#[derive(Args, Debug)]
pub struct AddComponentArgs {
    #[arg(required = true, value_name = "NAME")]
    pub names: Vec<String>,
    /// Version of the pack the components belong to
    #[arg(long = "pack-version", value_name = "VERSION")]
    pub pack_version: Option<String>,
}

#[derive(Args, Debug)]
pub struct NamesArgs {
    #[arg(required = true, value_name = "NAME")]
    pub names: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum RemoveCommand {
    /// Remove components
    Component(NamesArgs),
    /// Remove packs and their members
    Pack(NamesArgs),
}

#[derive(Subcommand, Debug)]
pub enum CreateCommand {
    /// Create an empty pack under the composites directory
    Pack(CreatePackArgs),
}

#[derive(Args, Debug)]
pub struct CreatePackArgs {
    pub name: String,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CredentialArgs {
    /// Exchange username
    #[arg(long)]
    pub username: Option<String>,
    /// Exchange password
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum PublishCommand {
    /// Publish a local component
    Component(PublishComponentArgs),
    /// Publish a local pack and its members
    Pack(PublishPackArgs),
}

#[derive(Args, Debug)]
pub struct PublishComponentArgs {
    pub name: String,
    /// Pack the component belongs to
    #[arg(long)]
    pub pack: Option<String>,
    /// Build a release version of the component before publishing
    #[arg(long)]
    pub release: bool,
    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(Args, Debug)]
pub struct PublishPackArgs {
    pub name: String,
    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// List components
    Component,
    /// List packs
    Pack,
}

#[derive(Subcommand, Debug)]
pub enum SearchCommand {
    /// Search Exchange components
    Exchange(SearchArgs),
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    pub query: String,
    /// Show available versions instead of tags and description
    #[arg(long)]
    pub versions: bool,
}

#[derive(Args, Debug)]
pub struct ConfigureArgs {
    /// Exchange url stored in oraclejetconfig.json
    #[arg(long = "exchange-url", value_name = "URL")]
    pub exchange_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Set a key in the ojet tool config (e.g. tools.sass.path)
    Set(ConfigSetArgs),
}

#[derive(Args, Debug)]
pub struct ConfigSetArgs {
    /// Config key path (e.g. exchange.username)
    pub key: String,
    /// Value to assign to the key (stored as a string)
    pub value: String,
    /// Override config file path (default: $XDG_CONFIG_HOME/ojet/config.toml)
    #[arg(long = "file")]
    pub file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_flags() {
        let cli = Cli::try_parse_from([
            "ojet",
            "serve",
            "android",
            "--no-livereload",
            "--destination",
            "browser:firefox",
            "--server-port",
            "9000",
        ])
        .unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        let request = args.request();
        assert_eq!(request.build.platform.as_deref(), Some("android"));
        assert_eq!(request.livereload, Some(false));
        assert_eq!(request.port.as_deref(), Some("9000"));
        assert_eq!(request.build.destination.as_deref(), Some("browser:firefox"));
    }

    #[test]
    fn add_component_requires_names() {
        assert!(Cli::try_parse_from(["ojet", "add", "component"]).is_err());
        let cli = Cli::try_parse_from([
            "ojet",
            "add",
            "component",
            "oj-a@1.0.0",
            "oj-b",
            "--pack-version",
            "2.0.0",
        ])
        .unwrap();
        let Command::Add(AddCommand::Component(args)) = cli.command else {
            panic!("expected add component");
        };
        assert_eq!(args.names, vec!["oj-a@1.0.0", "oj-b"]);
        assert_eq!(args.pack_version.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn rejects_unknown_scope() {
        assert!(Cli::try_parse_from(["ojet", "add", "theme", "x"]).is_err());
        assert!(Cli::try_parse_from(["ojet", "list", "exchange"]).is_err());
    }

    #[test]
    fn global_flags_follow_the_verb() {
        let cli = Cli::try_parse_from(["ojet", "strip", "--verbose", "--project-dir", "/tmp/app"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.project_dir, Some(PathBuf::from("/tmp/app")));
    }
}
