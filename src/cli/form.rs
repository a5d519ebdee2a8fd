use std::io::{BufRead, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use ad_consent::form::PresentationSurface;
use ad_consent::form::protocol::event_url;
use ad_consent::{
    AdProvider, ConsentForm, ConsentFormListener, ConsentFormOptions, ConsentInformation,
    ConsentStatus,
};

/// Everything the form driver reacts to, from the surface and the listener.
enum Message {
    Event(String),
    Loaded,
    Opened,
    Error(String),
    Closed(ConsentStatus, bool),
}

#[derive(Debug, Default, Clone, Copy)]
struct Offers {
    personalized: bool,
    non_personalized: bool,
    ad_free: bool,
}

/// Presents the consent form as a numbered prompt on stdin/stdout.
struct TerminalSurface {
    tx: Mutex<Sender<Message>>,
    showing: Mutex<bool>,
    offers: Mutex<Offers>,
}

impl TerminalSurface {
    fn new(tx: Sender<Message>) -> Self {
        Self {
            tx: Mutex::new(tx),
            showing: Mutex::new(false),
            offers: Mutex::new(Offers::default()),
        }
    }

    fn emit(&self, url: String) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if tx.send(Message::Event(url)).is_err() {
            tracing::debug!("Form driver gone, dropping event");
        }
    }

    /// Read the offered options out of the setup command.
    fn parse_offers(command: &str) -> Option<Offers> {
        let args = command
            .strip_prefix("javascript:setUpConsentDialog(")?
            .strip_suffix(')')?;
        let args: serde_json::Value = serde_json::from_str(args).ok()?;
        let info: serde_json::Value = serde_json::from_str(args["args"]["info"].as_str()?).ok()?;
        Some(Offers {
            personalized: info["offer_personalized"].as_bool().unwrap_or(false),
            non_personalized: info["offer_non_personalized"].as_bool().unwrap_or(false),
            ad_free: info["offer_ad_free"].as_bool().unwrap_or(false),
        })
    }

    /// Ask until the user picks something. Returns the event URL the answer produces.
    fn prompt(&self, app_name: &str, providers: &[AdProvider]) -> anyhow::Result<String> {
        let offers = *self.offers.lock().unwrap_or_else(PoisonError::into_inner);

        println!("\n{app_name} shows ads from these partners:");
        for (i, p) in providers.iter().enumerate() {
            println!("  [{}] {}", i + 1, p.name);
        }

        let mut choices: Vec<(&str, &str)> = Vec::new();
        if offers.personalized {
            choices.push(("personalized", "Yes, continue to see relevant ads"));
        }
        if offers.non_personalized {
            choices.push(("non_personalized", "No, see ads that are less relevant"));
        }
        if offers.ad_free {
            choices.push(("ad_free", "Pay for the ad-free version"));
        }

        println!();
        for (i, (_, label)) in choices.iter().enumerate() {
            println!("  {}) {label}", i + 1);
        }
        println!("  p<N>) Open privacy policy of partner N");

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let mut line = String::new();
            if std::io::stdin().lock().read_line(&mut line)? == 0 {
                return Ok(event_url("dismiss", &[("status", "dismissed")]));
            }
            let answer = line.trim();

            if let Some(n) = answer.strip_prefix('p') {
                match pick(n, providers) {
                    Some(p) => {
                        return Ok(event_url(
                            "browser",
                            &[("url", p.privacy_policy_url.as_str())],
                        ));
                    }
                    None => {
                        println!("No partner {n}.");
                        continue;
                    }
                }
            }

            match pick(answer, &choices) {
                Some(&(token, _)) => return Ok(event_url("dismiss", &[("status", token)])),
                None => println!("Please pick one of the options above."),
            }
        }
    }
}

/// One-based menu selection.
fn pick<'a, T>(answer: &str, items: &'a [T]) -> Option<&'a T> {
    answer
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| items.get(i))
}

impl PresentationSurface for TerminalSurface {
    fn load(&self, resource: &str) {
        tracing::debug!(resource, "Terminal surface ready");
    }

    fn execute(&self, command: &str) {
        match Self::parse_offers(command) {
            Some(offers) => {
                *self.offers.lock().unwrap_or_else(PoisonError::into_inner) = offers;
                self.emit(event_url("load_complete", &[("status", "form_loaded")]));
            }
            None => self.emit(event_url(
                "load_complete",
                &[("status", "Error: unreadable setup command")],
            )),
        }
    }

    fn show(&self) -> bool {
        *self.showing.lock().unwrap_or_else(PoisonError::into_inner) = true;
        true
    }

    fn dismiss(&self) {
        *self.showing.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    fn is_showing(&self) -> bool {
        *self.showing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_browser(&self, url: &str) -> bool {
        println!("Open {url} in your browser to read the policy.");
        true
    }
}

struct ChannelListener {
    tx: Mutex<Sender<Message>>,
}

impl ChannelListener {
    fn send(&self, message: Message) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if tx.send(message).is_err() {
            tracing::debug!("Form driver gone, dropping listener callback");
        }
    }
}

impl ConsentFormListener for ChannelListener {
    fn on_consent_form_loaded(&self) {
        self.send(Message::Loaded);
    }

    fn on_consent_form_error(&self, reason: &str) {
        self.send(Message::Error(reason.to_string()));
    }

    fn on_consent_form_opened(&self) {
        self.send(Message::Opened);
    }

    fn on_consent_form_closed(&self, status: ConsentStatus, user_prefers_ad_free: bool) {
        self.send(Message::Closed(status, user_prefers_ad_free));
    }
}

pub struct FormArgs {
    pub privacy_url: String,
    pub app_name: String,
    pub personalized: bool,
    pub non_personalized: bool,
    pub ad_free: bool,
}

/// Run one load/show/dismiss cycle. Blocks on stdin.
pub fn run_form(info: Arc<ConsentInformation>, args: FormArgs) -> anyhow::Result<()> {
    let (tx, rx): (Sender<Message>, Receiver<Message>) = mpsc::channel();
    let surface = Arc::new(TerminalSurface::new(tx.clone()));
    let listener = Arc::new(ChannelListener { tx: Mutex::new(tx) });

    // With no explicit offers, present the usual yes/no pair.
    let default_offers = !(args.personalized || args.non_personalized || args.ad_free);
    let form = ConsentForm::new(
        Arc::clone(&info),
        surface.clone(),
        &args.privacy_url,
        ConsentFormOptions {
            listener: Some(listener),
            personalized_option: args.personalized || default_offers,
            non_personalized_option: args.non_personalized || default_offers,
            ad_free_option: args.ad_free,
            app_name: args.app_name.clone(),
        },
    )?;

    form.load();
    form.on_page_finished();

    while let Ok(message) = rx.recv() {
        match message {
            Message::Event(url) => {
                form.handle_url(&url);
            }
            Message::Loaded => form.show(),
            Message::Opened => loop {
                let providers = info.ad_providers()?;
                let url = surface.prompt(&args.app_name, &providers)?;
                let is_dismiss = url.contains("action=dismiss");
                form.handle_url(&url);
                if is_dismiss {
                    break;
                }
            },
            Message::Error(reason) => anyhow::bail!("Consent form error: {reason}"),
            Message::Closed(status, ad_free) => {
                println!("Consent status: {status}");
                if ad_free {
                    println!("You chose the ad-free version.");
                }
                return Ok(());
            }
        }
    }

    Ok(())
}
