use scholar::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Keep the terminal readable while chatting
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scholar_tools=info".parse()?)
                .add_directive("lance=off".parse()?),
        )
        .init();

    let config = Config::resolve("config.yaml")?;
    let manager = build_research_assistant(config).await?;
    let mut session = ChatSession::new();

    let mut input = String::new();
    loop {
        println!("Enter message: ");

        input.clear();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let message = input.trim();
        if message == "exit" || message == "quit" {
            break;
        }

        match manager.ask(&mut session, message).await {
            Ok(answer) => println!("{}\n", answer),
            Err(e) => println!("Error: {:#}\n", e),
        }
    }

    Ok(())
}
