use genbench_common::Result;

/// Whatever produces the `response` text. The real serving engine sits behind
/// this seam; the stub ships with [`EchoGenerator`].
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EchoGenerator;

impl EchoGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl TextGenerator for EchoGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        Ok(format!("echo: {prompt}"))
    }
}
