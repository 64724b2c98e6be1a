mod cmd;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use ojet_tooling::build::{self, BuildContext, component as component_build};
use ojet_tooling::cli::{
    AddCommand, BuildArgs, Cli, Command, CreateCommand, CredentialArgs, ListCommand,
    PublishCommand, RemoveCommand, SearchCommand,
};
use ojet_tooling::config::{self, ToolConfig};
use ojet_tooling::delegate::Toolbox;
use ojet_tooling::exchange::ExchangeClient;
use ojet_tooling::hooks::HookRunner;
use ojet_tooling::options::{BuildOptions, BuildRequest};
use ojet_tooling::project::Project;
use ojet_tooling::scopes::{self, component, list, pack, publish, search};
use ojet_tooling::{logging, serve, strip, validate};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let root = match cli.project_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to resolve the current directory")?,
    };

    match cli.command {
        Command::Build(args) => run_build(&root, &args),
        Command::Serve(args) => {
            let project = Project::load(&root)?;
            let options = validate::serve_options(&project, &args.request())?;
            let ctx = context(project, options.build_options.clone())?;
            serve::serve(ctx, &options)
        }
        Command::Clean(args) => {
            let project = Project::load(&root)?;
            let request = BuildRequest {
                platform: args.platform,
                ..Default::default()
            };
            let options = validate::build_options(&project, &request)?;
            build::clean(&context(project, options)?)
        }
        Command::Add(add) => {
            let mut project = Project::load(&root)?;
            let tools = toolbox(&root)?;
            match add {
                AddCommand::Component(args) => {
                    let client = ExchangeClient::for_project(&project)?;
                    component::add(
                        &mut project,
                        &tools,
                        &client,
                        &args.names,
                        args.pack_version.as_deref(),
                    )
                }
                AddCommand::Pack(args) => {
                    let client = ExchangeClient::for_project(&project)?;
                    pack::add(&mut project, &tools, &client, &args.names)
                }
                AddCommand::Sass => scopes::add_sass(&project, &tools),
            }
        }
        Command::Remove(remove) => {
            let mut project = Project::load(&root)?;
            let tools = toolbox(&root)?;
            let client = ExchangeClient::for_project(&project)?;
            match remove {
                RemoveCommand::Component(args) => {
                    component::remove(&mut project, &tools, &client, &args.names)
                }
                RemoveCommand::Pack(args) => pack::remove(&mut project, &tools, &client, &args.names),
            }
        }
        Command::Create(CreateCommand::Pack(args)) => pack::create(&Project::load(&root)?, &args.name),
        Command::Publish(command) => run_publish(&root, command),
        Command::List(command) => {
            let scope = match command {
                ListCommand::Component => list::ListScope::Component,
                ListCommand::Pack => list::ListScope::Pack,
            };
            list::list(&Project::load(&root)?, scope)
        }
        Command::Search(SearchCommand::Exchange(args)) => {
            let client = ExchangeClient::for_project(&Project::load(&root)?)?;
            search::search(&client, &args.query, args.versions)
        }
        Command::Configure(args) => {
            let mut project = Project::load(&root)?;
            scopes::configure(&mut project, args.exchange_url.as_deref())
        }
        Command::Strip => {
            strip::strip(&root)?;
            Ok(())
        }
        Command::Config(config_cmd) => cmd::config::run(config_cmd),
    }
}

fn tool_config() -> Result<ToolConfig> {
    config::load()
}

fn toolbox(root: &Path) -> Result<Toolbox> {
    Ok(Toolbox::new(tool_config()?, root))
}

fn context(project: Project, options: BuildOptions) -> Result<BuildContext> {
    let hooks = HookRunner::load(&project.root)?;
    let tools = toolbox(&project.root)?;
    Ok(BuildContext::new(project, tools, hooks, options))
}

fn run_build(root: &Path, args: &BuildArgs) -> Result<()> {
    let project = Project::load(root)?;
    let options = validate::build_options(&project, &args.request())?;
    let ctx = context(project, options)?;
    match &args.component {
        Some(name) => component_build::build_component(&ctx, name).map(|_| ()),
        None => build::build(&ctx),
    }
}

fn credentials(args: &CredentialArgs, tools: &ToolConfig) -> Result<publish::Credentials> {
    Ok(publish::Credentials {
        username: args.username.clone(),
        password: args.password.clone(),
        token: tools.exchange_token()?,
        default_username: tools.exchange.username.clone(),
    })
}

fn run_publish(root: &Path, command: PublishCommand) -> Result<()> {
    let project = Project::load(root)?;
    let client = ExchangeClient::for_project(&project)?;
    let tools = tool_config()?;
    match command {
        PublishCommand::Component(args) => {
            let ctx = if args.release {
                let request = BuildRequest {
                    platform: Some("web".into()),
                    release: true,
                    ..Default::default()
                };
                let options = validate::build_options(&project, &request)?;
                Some(context(project.clone(), options)?)
            } else {
                None
            };
            let publisher = publish::Publisher::new(
                &project,
                &client,
                credentials(&args.credentials, &tools)?,
                ctx.as_ref(),
            );
            publisher.publish_component(&args.name, args.pack.as_deref())
        }
        PublishCommand::Pack(args) => {
            let publisher = publish::Publisher::new(
                &project,
                &client,
                credentials(&args.credentials, &tools)?,
                None,
            );
            publisher.publish_pack(&args.name)
        }
    }
}
