use async_trait::async_trait;
use tracing::debug;

use crate::msg::PromptMsg;
use crate::recorder::Recorder;

/// One prompt processor. Nodes record failures into the [`Recorder`] and
/// leave the working set untouched on error; the request always proceeds.
#[async_trait]
pub trait PromptNode: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, msg: &mut PromptMsg, recorder: &mut Recorder);
}

/// Ordered list of processors, executed sequentially.
pub struct PromptChain {
    nodes: Vec<Box<dyn PromptNode>>,
}

impl PromptChain {
    pub fn new(nodes: Vec<Box<dyn PromptNode>>) -> Self {
        Self { nodes }
    }

    /// The empty chain: input passes through unchanged.
    pub fn passthrough() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn is_passthrough(&self) -> bool {
        self.nodes.is_empty()
    }

    pub async fn execute(&self, msg: &mut PromptMsg, recorder: &mut Recorder) {
        for node in &self.nodes {
            debug!(node = node.name(), "chain node start");
            node.run(msg, recorder).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragway_core::identity::Identity;
    use ragway_core::message::Message;
    use std::sync::Arc;

    struct Renamer;

    #[async_trait]
    impl PromptNode for Renamer {
        fn name(&self) -> &'static str {
            "renamer"
        }
        async fn run(&self, msg: &mut PromptMsg, recorder: &mut Recorder) {
            msg.system_msg = Some(Message::system("rewritten"));
            recorder.prompt_processed = true;
        }
    }

    #[tokio::test]
    async fn passthrough_chain_leaves_input_unchanged() {
        let input = vec![Message::system("sys"), Message::user("hello")];
        let mut msg = PromptMsg::split(input.clone(), 1, Arc::new(Identity::default()));
        let mut recorder = Recorder::default();
        PromptChain::passthrough().execute(&mut msg, &mut recorder).await;
        assert_eq!(msg.reassemble(), input);
        assert!(!recorder.prompt_processed);
    }

    #[tokio::test]
    async fn nodes_run_in_order_and_mutate() {
        let input = vec![Message::system("sys"), Message::user("hello")];
        let mut msg = PromptMsg::split(input, 1, Arc::new(Identity::default()));
        let mut recorder = Recorder::default();
        PromptChain::new(vec![Box::new(Renamer)])
            .execute(&mut msg, &mut recorder)
            .await;
        assert_eq!(msg.system_msg.unwrap().text(), "rewritten");
        assert!(recorder.prompt_processed);
    }
}
