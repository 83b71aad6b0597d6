use super::{Invocation, OpResult};
use crate::phpser::{self, Value};
use crate::response::{print_r, Reply};

/// `name:value`; the name must be non-empty.
fn split_name_value(arg: &str) -> Option<(&str, &str)> {
    arg.split_once(':').filter(|(name, _)| !name.is_empty())
}

pub fn get(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    let Some(raw) = inv.ctx.options().get(arg)? else {
        reply.text("NOTFOUND")?;
        return Ok(());
    };
    match phpser::try_decode(raw.as_bytes()) {
        Some(value @ (Value::Array(_) | Value::Object { .. } | Value::Custom { .. })) => {
            reply.line("MULTILINE")?;
            reply.text(&print_r(&value))?;
        }
        Some(Value::Str(bytes)) => {
            reply.line("OK")?;
            reply.bytes(&bytes)?;
            reply.line("")?;
        }
        Some(scalar) => {
            reply.line("OK")?;
            reply.line(&print_r(&scalar))?;
        }
        None => {
            reply.line("OK")?;
            reply.line(&raw)?;
        }
    }
    Ok(())
}

pub fn add(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    let Some((name, value)) = split_name_value(arg) else {
        reply.syntax_error()?;
        return Ok(());
    };
    let token = if inv.ctx.options().add(name, value)? { "ADDED" } else { "ERROR" };
    reply.text(token)?;
    Ok(())
}

pub fn update(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    let Some((name, value)) = split_name_value(arg) else {
        reply.syntax_error()?;
        return Ok(());
    };
    let token = if inv.ctx.options().update(name, value)? { "UPDATED" } else { "ERROR" };
    reply.line(token)?;
    Ok(())
}

pub fn delete(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    let token = if inv.ctx.options().delete(arg)? { "DELETED" } else { "NOTFOUND" };
    reply.text(token)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing::Fixture;

    #[test]
    fn test_get_missing_option() {
        let fx = Fixture::new();
        assert_eq!(fx.run(get, "nonexistent_key"), "NOTFOUND");
    }

    #[test]
    fn test_get_scalar_and_serialized_values() {
        let fx = Fixture::new();
        let opts = fx.ctx.options();
        opts.add("blogname", "My Site").unwrap();
        opts.add("quoted", "s:5:\"hello\";").unwrap();
        opts.add("count", "i:42;").unwrap();
        opts.add("list", "a:1:{i:0;s:1:\"x\";}").unwrap();

        assert_eq!(fx.run(get, "blogname"), "OK\nMy Site\n");
        assert_eq!(fx.run(get, "quoted"), "OK\nhello\n");
        assert_eq!(fx.run(get, "count"), "OK\n42\n");
        assert_eq!(fx.run(get, "list"), "MULTILINE\nArray\n(\n    [0] => x\n)\n");
    }

    #[test]
    fn test_add_update_delete_tokens() {
        let fx = Fixture::new();
        assert_eq!(fx.run(add, "siteurl:http://a:8080"), "ADDED");
        assert_eq!(fx.run(add, "siteurl:other"), "ERROR");
        assert_eq!(
            fx.ctx.options().get("siteurl").unwrap().as_deref(),
            Some("http://a:8080")
        );

        assert_eq!(fx.run(update, "siteurl:http://b"), "UPDATED\n");
        assert_eq!(fx.run(update, "siteurl:http://b"), "ERROR\n");

        assert_eq!(fx.run(delete, "siteurl"), "DELETED");
        assert_eq!(fx.run(delete, "siteurl"), "NOTFOUND");
    }

    #[test]
    fn test_syntax_errors() {
        let fx = Fixture::new();
        assert_eq!(fx.run(add, "novalue"), "Syntax Error");
        assert_eq!(fx.run(update, ":x"), "Syntax Error");
    }
}
