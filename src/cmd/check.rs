//! A subcommand making sure the environment is fine for `serve`, without
//! actually starting the server.

use std::{net::SocketAddr, sync::Arc};

use crate::{
    api,
    args::{Args, Shared},
    config::Config,
    load_config_and_init_logger,
    prelude::*,
};


pub(crate) async fn run(shared: &Shared, args: &Args) -> Result<()> {
    let config = load_config_and_init_logger(shared, args)
        .context("failed to load config: cannot proceed with `check` command")?;

    info!("Starting to verify various things...");
    let schema = check_schema(&config).await;
    let bind = check_bind(&config).await;
    info!("Done verifying various things");


    // Print summary after all log output
    let mut any_errors = false;
    println!();
    bunt::println!("{$bold+blue+intense}Summary{/$}");
    println!();
    print_outcome(&mut any_errors, "Load configuration", &Ok(()));
    print_outcome(&mut any_errors, "Build and self-test API schema", &schema);
    print_outcome(&mut any_errors, "Bind HTTP listen address", &bind);

    println!();
    if any_errors {
        bunt::println!("{$red+intense}➡  Errors have occured!{/$}");
        std::process::exit(1);
    } else {
        bunt::println!("{$green+intense}⮕  Everything OK{/$}");
        Ok(())
    }
}

fn print_outcome<T>(any_errors: &mut bool, label: &str, result: &Result<T>) {
    match result {
        Ok(_) => {
            bunt::println!(" ▸ {[bold+intense]}  {$green+bold}✔ ok{/$}", label);
        }
        Err(e) => {
            *any_errors = true;
            bunt::println!(" ▸ {[bold+intense]}  {$red+bold}✘ error{/$}", label);
            bunt::println!("      {$red}▶▶▶ {$bold}Error:{/$}{/$} {[yellow+intense]}", e);
            println!();
            bunt::println!("      {$red+italic}Caused by:{/$}");

            for (i, cause) in e.chain().skip(1).enumerate() {
                print!("       {: >1$}", "", i * 2);
                println!("‣ {cause}");
            }
            println!();
        }
    }
}

async fn check_schema(config: &Config) -> Result<()> {
    let root = api::root_node();
    let context = api::Context { config: Arc::new(config.api.clone()) };
    api::self_test(&root, &context).await
}

async fn check_bind(config: &Config) -> Result<()> {
    let addr = SocketAddr::new(config.http.address, config.http.port);
    let listener = tokio::net::TcpListener::bind(addr).await
        .with_context(|| format!("failed to bind to {addr} (port already in use?)"))?;
    drop(listener);
    Ok(())
}
