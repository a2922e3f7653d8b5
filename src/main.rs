#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Restriction lints
#![warn(
    clippy::clone_on_ref_ptr,
    clippy::if_then_some_else_none,
    clippy::unnecessary_cast
)]
// False positives
#![allow(clippy::needless_pass_by_value)] // for dptree handlers
// Style
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::redundant_closure_for_method_calls)]

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::sync::Arc;

use anyhow::{Context, Result};
use argh::FromArgs;
use common::{BotEnv, State};
use metrics_exporter_prometheus::PrometheusBuilder;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::{Dispatcher, HandlerExt, UpdateFilterExt};
use teloxide::payloads::AnswerCallbackQuerySetters;
use teloxide::requests::Requester;
use teloxide::types::{CallbackQuery, Message, Update};
use teloxide::Bot;
use tokio_util::sync::CancellationToken;

mod common;
mod config;
mod directus;
mod metrics;
mod models;
mod modules;
mod utils;
mod web_srv;

const VERSION: &str = git_version::git_version!(fallback = "unknown");

/// dormbot
#[derive(FromArgs, PartialEq, Debug)]
struct Args {
    /// config file
    #[argh(positional)]
    config_file: OsString,
}

#[tokio::main]
async fn main() -> Result<()> {
    std::env::set_var("RUST_LOG", "info");
    pretty_env_logger::init();
    let args: Args = argh::from_env();
    log::info!("Version {VERSION}");
    run_bot(&args.config_file).await
}

async fn run_bot(config_fpath: &OsStr) -> Result<()> {
    let prometheus = PrometheusBuilder::new().install_recorder()?;
    metrics::register_metrics();

    let config: config::Config = serde_yaml::from_reader(
        File::open(config_fpath).context("Failed to open config")?,
    )
    .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;
    let config = Arc::new(config);

    let reqwest_client = reqwest::Client::new();
    let bot_env = Arc::new(BotEnv {
        directus: directus::Directus::new(
            &config.services.directus,
            reqwest_client.clone(),
        ),
        reqwest_client,
        config: Arc::clone(&config),
    });

    let bot = Bot::new(&config.telegram.token);

    let mut dispatcher = Dispatcher::builder(
        bot.clone(),
        dptree::entry()
            .branch(
                Update::filter_message()
                    .enter_dialogue::<Message, InMemStorage<State>, State>()
                    .branch(modules::basic::command_handler())
                    .branch(modules::checkin::message_handler())
                    .branch(modules::relocation::message_handler())
                    .branch(modules::bus_schedule::message_handler())
                    .branch(modules::assistant::message_handler())
                    .branch(modules::assistant::question_handler())
                    .endpoint(modules::basic::fallback),
            )
            .branch(
                Update::filter_callback_query()
                    .enter_dialogue::<CallbackQuery, InMemStorage<State>, State>()
                    .branch(modules::assistant::callback_handler())
                    .endpoint(drop_callback_query),
            )
            .endpoint(drop_endpoint),
    )
    .dependencies(dptree::deps![
        InMemStorage::<State>::new(),
        Arc::clone(&bot_env)
    ])
    .build();

    let bot_shutdown_token = dispatcher.shutdown_token();
    let mut join_handles = Vec::new();
    join_handles.push(tokio::spawn(async move { dispatcher.dispatch().await }));

    let cancel = CancellationToken::new();
    join_handles.push(tokio::spawn(web_srv::run(
        bot,
        config.server_addr,
        prometheus,
        cancel.clone(),
    )));

    run_signal_handler(bot_shutdown_token, cancel);

    futures::future::join_all(join_handles).await;

    Ok(())
}

async fn drop_callback_query(
    bot: Bot,
    callback_query: CallbackQuery,
) -> Result<()> {
    log::warn!("Unexpected callback query: {callback_query:?}");
    bot.answer_callback_query(&callback_query.id)
        .text("Error: unexpected callback query")
        .await?;
    Ok(())
}

async fn drop_endpoint() -> Result<()> {
    Ok(())
}

fn run_signal_handler(
    bot_shutdown_token: teloxide::dispatching::ShutdownToken,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.expect("Failed to listen for SIGINT");
            cancel.cancel();
            match bot_shutdown_token.shutdown() {
                Ok(f) => {
                    log::info!(
                        "^C received, trying to shutdown the dispatcher..."
                    );
                    tokio::select! {
                        () = f => {
                            log::info!("dispatcher is shutdown...");
                        }
                        _ = tokio::signal::ctrl_c() => {
                            log::info!("Got another ^C, exiting immediately");
                            std::process::exit(0);
                        }
                    }
                }
                Err(_) => {
                    log::info!("^C received, the dispatcher isn't running, ignoring the signal");
                }
            }
        }
    });
}
