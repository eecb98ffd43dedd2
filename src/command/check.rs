use crate::command;
use crate::command::server::{canonical_path, ServerContext};
use crate::configuration::Configuration;
use argh::FromArgs;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "check",
    description = "Show which application and constraint would handle a request path"
)]
pub struct Options {
    #[argh(positional)]
    /// request path, including the application context path
    path: String,
}

pub struct Command {
    context: ServerContext,
}

impl Command {
    pub fn new(config: &Configuration) -> Self {
        Self {
            context: ServerContext::new(config),
        }
    }

    pub fn describe(&self, path: &str) -> String {
        let canonical = match canonical_path(path) {
            Ok(canonical) => canonical,
            Err(error) => return format!("{path}: {error}"),
        };
        let Some((application, resource)) = self.context.resolve(&canonical) else {
            return format!("{path}: no application");
        };

        let resource_path = resource.to_path();
        match application.gate.constraints().find(&resource_path) {
            Some(constraint) => format!(
                "{path}: application '{}', resource '{resource_path}' protected by '{}' ({} realm '{}')",
                application.name,
                constraint.url_pattern().as_str(),
                constraint.auth_type(),
                constraint.realm_name(),
            ),
            None => format!(
                "{path}: application '{}', resource '{resource_path}' unprotected",
                application.name
            ),
        }
    }

    pub fn run(&self, options: &Options) -> Result<(), command::Error> {
        println!("{}", self.describe(&options.path));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_command() -> Command {
        let config = r#"
        [server]
        bind_address = "127.0.0.1"

        [application.shop]
        context_path = "/shop"

        [[application.shop.constraint]]
        url_pattern = "/secure/*"
        auth_type = "Digest"
        realm_name = "R"

        [[application.shop.constraint]]
        url_pattern = "/secure/open"
        auth_type = "Basic"
        realm_name = "R"
        "#;

        Command::new(&Configuration::load_from_str(config).unwrap())
    }

    #[test]
    fn test_describe_protected_path() {
        assert_eq!(
            build_command().describe("/shop/secure/open"),
            "/shop/secure/open: application 'shop', resource '/secure/open' protected by '/secure/*' (Digest realm 'R')"
        );
    }

    #[test]
    fn test_describe_unprotected_path() {
        assert_eq!(
            build_command().describe("/shop/catalog"),
            "/shop/catalog: application 'shop', resource '/catalog' unprotected"
        );
    }

    #[test]
    fn test_describe_uses_canonical_path() {
        assert_eq!(
            build_command().describe("/shop/x/../secure/%6fpen"),
            "/shop/x/../secure/%6fpen: application 'shop', resource '/secure/open' protected by '/secure/*' (Digest realm 'R')"
        );
        assert_eq!(
            build_command().describe("/../shop"),
            "/../shop: Bad Request: Request path '/../shop' escapes the root"
        );
    }

    #[test]
    fn test_describe_unknown_application() {
        assert_eq!(
            build_command().describe("/blog/post"),
            "/blog/post: no application"
        );
    }
}
