//! Operator interaction.
//!
//! Password entry, yes/no questions and "press Enter when done" pauses all go
//! through [`Prompter`] so the phases can run against canned answers in tests.

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password};

pub trait Prompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool>;

    /// Block until the operator acknowledges `message`.
    fn acknowledge(&self, message: &str) -> Result<()>;

    /// Read a new password, asking twice.
    fn new_password(&self, prompt: &str) -> Result<String>;
}

pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        Ok(Confirm::new()
            .with_prompt(question)
            .default(default)
            .interact()?)
    }

    fn acknowledge(&self, message: &str) -> Result<()> {
        Input::<String>::new()
            .with_prompt(format!("{} [Enter]", message))
            .allow_empty(true)
            .interact_text()
            .context("waiting for acknowledgement")?;
        Ok(())
    }

    fn new_password(&self, prompt: &str) -> Result<String> {
        Password::new()
            .with_prompt(prompt)
            .with_confirmation("Repeat password", "Passwords do not match, try again")
            .interact()
            .context("reading password")
    }
}

#[cfg(test)]
pub use scripted::ScriptedPrompter;

#[cfg(test)]
mod scripted {
    use super::Prompter;
    use anyhow::{Result, anyhow};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Answers prompts from queues; running out of answers is an error so a
    /// test notices unexpected questions.
    #[derive(Default)]
    pub struct ScriptedPrompter {
        confirms: RefCell<VecDeque<bool>>,
        passwords: RefCell<VecDeque<String>>,
        acknowledged: Cell<usize>,
    }

    impl ScriptedPrompter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn confirm_with(self, answer: bool) -> Self {
            self.confirms.borrow_mut().push_back(answer);
            self
        }

        pub fn password_with(self, password: &str) -> Self {
            self.passwords.borrow_mut().push_back(password.to_string());
            self
        }

        pub fn acknowledgements(&self) -> usize {
            self.acknowledged.get()
        }

        pub fn passwords_left(&self) -> usize {
            self.passwords.borrow().len()
        }
    }

    impl Prompter for ScriptedPrompter {
        fn confirm(&self, question: &str, _default: bool) -> Result<bool> {
            self.confirms
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| anyhow!("unexpected question: {}", question))
        }

        fn acknowledge(&self, _message: &str) -> Result<()> {
            self.acknowledged.set(self.acknowledged.get() + 1);
            Ok(())
        }

        fn new_password(&self, prompt: &str) -> Result<String> {
            self.passwords
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| anyhow!("unexpected password prompt: {}", prompt))
        }
    }
}
