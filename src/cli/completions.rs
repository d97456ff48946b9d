use clap::Parser;

/// Arguments for completions command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    retrobuild completions bash > ~/.bash_completion.d/retrobuild\n\n\
                  Generate zsh completions:\n    retrobuild completions zsh > ~/.zfunc/_retrobuild\n\n\
                  Generate fish completions:\n    retrobuild completions fish > ~/.config/fish/completions/retrobuild.fish")]
pub struct CompletionsArgs {
    /// Shell type (bash, elvish, fish, powershell, zsh)
    pub shell: String,
}
