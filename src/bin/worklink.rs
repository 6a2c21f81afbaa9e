use std::io::{BufRead, Write};
use std::thread;
use std::time::Duration;
use worklink::config::Settings;
use worklink::controller::Controller;
use worklink::session::Role;

fn output_header() -> &'static str {
    "Worklink\nWorklink keeps an operator synchronized with a long-running remote workflow.\nCommands: /new starts a fresh conversation, /quit exits."
}

fn run() -> Result<(), String> {
    println!("{}\n", output_header());

    let settings = Settings::load_default().map_err(|err| err.to_string())?;
    let mut controller = Controller::new(&settings).map_err(|err| err.to_string())?;

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush().map_err(|err| err.to_string())?;

        let mut line = String::new();
        if stdin
            .lock()
            .read_line(&mut line)
            .map_err(|err| err.to_string())?
            == 0
        {
            break;
        }
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" => break,
            "/new" => {
                controller.start_new_conversation();
                println!("started a new conversation");
                continue;
            }
            _ => {}
        }

        if let Err(err) = controller.send_message(input) {
            eprintln!("{err}");
            continue;
        }
        follow_run(&mut controller);
    }

    Ok(())
}

/// Prints agent updates until the run stops accepting events.
fn follow_run(controller: &mut Controller) {
    let mut last_printed = String::new();
    loop {
        controller.pump_events();
        if let Some(entry) = controller
            .session()
            .timeline
            .iter()
            .rev()
            .find(|entry| entry.role == Role::Agent)
        {
            let line = match (&entry.agent_name, entry.status) {
                (Some(agent), Some(status)) => format!("[{agent}] {status}: {}", entry.content),
                (None, Some(status)) => format!("{status}: {}", entry.content),
                _ => entry.content.clone(),
            };
            if line != last_printed {
                println!("{line}");
                last_printed = line;
            }
        }
        if controller.session().accepting_input {
            break;
        }
        thread::sleep(Duration::from_millis(200));
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
