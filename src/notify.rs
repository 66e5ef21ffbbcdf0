use std::sync::Mutex;

use rand::Rng;

use choco_types::Config;

/// Inclusive-range die roll. Injected so tests control both the trigger and
/// the message choice deterministically.
pub type Dice = Box<dyn FnMut(u32, u32) -> u32 + Send>;

const MESSAGES: [&str; 5] = [
    "Did you know the business edition automates package internalization?",
    "Tip: 'choco outdated' shows every package with a newer version available.",
    "Pin a package with '--pin' to hold it back from bulk upgrades.",
    "Package list documents let one file describe a whole machine's software.",
    "Run with '--noop' to see what a command would do without doing it.",
];

/// Emits a promotional line on roughly one run in ten, for unlicensed runs
/// with regular output.
pub struct Notifier {
    dice: Mutex<Dice>,
    messages: Vec<&'static str>,
}

impl Notifier {
    pub fn new(dice: Dice) -> Notifier {
        Notifier {
            dice: Mutex::new(dice),
            messages: MESSAGES.to_vec(),
        }
    }

    pub fn system() -> Notifier {
        Notifier::new(Box::new(|lo, hi| rand::thread_rng().gen_range(lo..=hi)))
    }

    /// Returns the emitted message, if this run was one of the lucky ones.
    /// A caller-supplied message wins over the built-in list.
    pub fn maybe_notify(&self, config: &Config, message: Option<&str>) -> Option<String> {
        if config.licensed || !config.features.regular_output {
            return None;
        }

        let mut dice = self.dice.lock().unwrap();
        if (dice)(1, 10) != 3 {
            return None;
        }

        let text = match message {
            Some(m) => m.to_string(),
            None => {
                let index = (dice)(0, self.messages.len() as u32) as usize;
                // Clamp: the roll's upper bound is inclusive.
                let index = index.min(self.messages.len() - 1);
                self.messages[index].to_string()
            }
        };

        log::info!("{}", text);
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    fn scripted(rolls: Vec<u32>) -> Notifier {
        let queue = Arc::new(Mutex::new(VecDeque::from(rolls)));
        Notifier::new(Box::new(move |lo, _hi| {
            queue.lock().unwrap().pop_front().unwrap_or(lo)
        }))
    }

    #[test]
    fn fires_only_on_three() {
        let config = Config::default();
        assert!(scripted(vec![4]).maybe_notify(&config, None).is_none());
        assert!(scripted(vec![3, 0]).maybe_notify(&config, None).is_some());
    }

    #[test]
    fn caller_message_wins() {
        let config = Config::default();
        let emitted = scripted(vec![3]).maybe_notify(&config, Some("custom"));
        assert_eq!(emitted.as_deref(), Some("custom"));
    }

    #[test]
    fn overflowing_choice_clamps_to_last_message() {
        let config = Config::default();
        let emitted = scripted(vec![3, 1000]).maybe_notify(&config, None);
        assert_eq!(emitted.as_deref(), Some(MESSAGES[MESSAGES.len() - 1]));
    }

    #[test]
    fn licensed_or_quiet_runs_stay_silent() {
        let mut config = Config::default();
        config.licensed = true;
        assert!(scripted(vec![3, 0]).maybe_notify(&config, None).is_none());

        let mut config = Config::default();
        config.features.regular_output = false;
        assert!(scripted(vec![3, 0]).maybe_notify(&config, None).is_none());
    }
}
