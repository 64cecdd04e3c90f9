use std::io::Read;

use crate::catalog::populate::populated_exchange;
use crate::chat::{Message, Role};
use crate::config::read_config;
use crate::die;
use crate::dispatch::Dispatcher;
use crate::ChatArgs;

fn read_prompt(args: &ChatArgs) -> String {
    if let Some(prompt) = &args.prompt {
        return prompt.clone();
    }

    let mut prompt = String::new();

    if let Err(err) = std::io::stdin().read_to_string(&mut prompt) {
        die!("failed to read the prompt from stdin: {}", err);
    }

    let prompt = prompt.trim().to_string();

    if prompt.is_empty() {
        die!("no prompt was provided");
    }

    prompt
}

/// Send one prompt through the dispatcher and print the reply.
pub(crate) async fn chat_cmd(args: &ChatArgs) {
    let prompt = read_prompt(args);

    let config = read_config(None);
    let exchange = populated_exchange(&config).await;

    let mut messages = Vec::new();

    if let Some(system) = &args.system {
        messages.push(Message::new(Role::System, system.clone()));
    }

    messages.push(Message::new(Role::User, prompt));

    let dispatcher = Dispatcher::new(&exchange, Some(args.model.clone()));

    match dispatcher
        .complete(&messages, args.max_tokens, args.temperature)
        .await
    {
        Ok(reply) => println!("{}", reply),
        Err(err) => die!("{}", err),
    }
}
