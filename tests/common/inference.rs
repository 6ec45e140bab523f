use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use mobile_agent::{
    agent::{ai_model::InferenceService, error::ServiceFault},
    screen::screen_model::{ImageRef, Resolution},
};

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Timeout,
    /// Screenshot could not be encoded; the request is never sent.
    BadImage,
}

/// Replays canned replies in order; the last one repeats forever.
pub struct ScriptedInference {
    replies: RefCell<VecDeque<Reply>>,
    last: RefCell<Reply>,
    prompts: Rc<RefCell<Vec<String>>>,
}

impl ScriptedInference {
    pub fn script(replies: Vec<Reply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            last: RefCell::new(Reply::Text(String::new())),
            prompts: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn texts(replies: &[&str]) -> Self {
        Self::script(replies.iter().map(|r| Reply::Text(r.to_string())).collect())
    }

    pub fn repeating(reply: &str) -> Self {
        Self::texts(&[reply])
    }

    /// Every call times out.
    pub fn unavailable() -> Self {
        Self::script(vec![Reply::Timeout])
    }

    pub fn prompts(&self) -> Rc<RefCell<Vec<String>>> {
        self.prompts.clone()
    }
}

impl InferenceService for ScriptedInference {
    fn infer(
        &self,
        prompt: &str,
        _image: &ImageRef,
        _frame: Resolution,
        timeout: Duration,
    ) -> Result<String, ServiceFault> {
        self.prompts.borrow_mut().push(prompt.to_string());

        let next = self.replies.borrow_mut().pop_front();
        if let Some(reply) = next {
            *self.last.borrow_mut() = reply;
        }

        match &*self.last.borrow() {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Timeout => Err(ServiceFault::Timeout(timeout)),
            Reply::BadImage => Err(ServiceFault::Image("not an image".into())),
        }
    }
}
