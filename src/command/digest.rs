use crate::command;
use crate::gate::strategy::digest::ha1;
use argh::FromArgs;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "digest",
    description = "Compute the Digest HA1 of a realm user"
)]
pub struct Options {
    #[argh(positional)]
    /// realm the user belongs to
    realm: String,

    #[argh(positional)]
    /// name of the user
    username: String,
}

pub struct Command {}

impl Command {
    pub fn run(options: &Options) -> Result<(), command::Error> {
        let password = rpassword::prompt_password("Input Password: ")?;
        println!("{}", ha1(&options.username, &options.realm, &password));
        Ok(())
    }
}
