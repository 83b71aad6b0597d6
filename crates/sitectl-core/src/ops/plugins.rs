use super::{Invocation, OpResult};
use crate::response::Reply;

/// A `<plugin>:<site>` argument targets one site of a network, which a
/// single-site install does not have.
fn reject_site_suffix(arg: &str, reply: &mut Reply<'_>) -> std::io::Result<bool> {
    if arg.contains(':') {
        reply.error("NotMulti")?;
        return Ok(true);
    }
    Ok(false)
}

fn yes_no(active: bool) -> &'static str {
    if active {
        "yes"
    } else {
        "no"
    }
}

fn list_with(inv: &Invocation<'_>, reply: &mut Reply<'_>, by_slug: bool) -> OpResult {
    let registry = inv.ctx.plugins();
    let active = registry.active()?;
    reply.line("OK:List")?;
    for plugin in registry.discover()? {
        let key = if by_slug { plugin.slug() } else { Some(plugin.file.as_str()) };
        let Some(key) = key else { continue };
        let is_active = active.iter().any(|f| *f == plugin.file);
        reply.line(&format!(
            "{key}:{}:{}:{}",
            yes_no(is_active),
            plugin.version,
            plugin.name
        ))?;
    }
    Ok(())
}

/// `<file>:<yes|no>:<version>:<name>` per installed plugin.
pub fn list(inv: &Invocation<'_>, _arg: &str, reply: &mut Reply<'_>) -> OpResult {
    list_with(inv, reply, false)
}

/// Like [`list`], keyed by plugin directory; top-level plugin files are
/// left out.
pub fn list_slugs(inv: &Invocation<'_>, _arg: &str, reply: &mut Reply<'_>) -> OpResult {
    list_with(inv, reply, true)
}

pub fn status(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    if reject_site_suffix(arg, reply)? {
        return Ok(());
    }
    let active = inv.ctx.plugins().is_active(arg)?;
    reply.text(&format!("STATUS:{}", yes_no(active)))?;
    Ok(())
}

pub fn activate(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    if reject_site_suffix(arg, reply)? {
        return Ok(());
    }
    if inv.ctx.plugins().activate(arg)? {
        reply.text(&format!("OK:Activated:{arg}"))?;
    } else {
        reply.error(&format!("Failed:{arg}"))?;
    }
    Ok(())
}

pub fn deactivate(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    if reject_site_suffix(arg, reply)? {
        return Ok(());
    }
    if inv.ctx.plugins().deactivate(arg)? {
        reply.text(&format!("OK:Deactivated:{arg}"))?;
    } else {
        reply.text(&format!("OK:WasNotActive:{arg}"))?;
    }
    Ok(())
}

/// Activate every plugin whose file starts with the slug, one line each.
pub fn activate_slug(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    if reject_site_suffix(arg, reply)? {
        return Ok(());
    }
    let registry = inv.ctx.plugins();
    let files = registry.canonical(arg)?;
    if files.is_empty() {
        reply.error("CouldNotFindPlugins")?;
        return Ok(());
    }
    for file in files {
        if registry.activate(&file)? {
            reply.line(&format!("OK:Activated:{file}"))?;
        } else {
            reply.line(&format!("ERROR:Failed:{file}"))?;
        }
    }
    Ok(())
}

pub fn deactivate_slug(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    if reject_site_suffix(arg, reply)? {
        return Ok(());
    }
    let registry = inv.ctx.plugins();
    let files = registry.canonical(arg)?;
    if files.is_empty() {
        reply.error("CouldNotFindPlugins")?;
        return Ok(());
    }
    for file in files {
        if registry.deactivate(&file)? {
            reply.line(&format!("OK:Deactivated:{file}"))?;
        } else {
            reply.line(&format!("OK:WasNotActive:{file}"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing::Fixture;

    fn fixture() -> Fixture {
        let fx = Fixture::new();
        fx.write(
            "content/plugins/akismet/akismet.php",
            "<?php\n/*\nPlugin Name: Akismet\nVersion: 5.3\n*/",
        );
        fx.write(
            "content/plugins/akismet/extra.php",
            "<?php\n/*\nPlugin Name: Akismet Extra\nVersion: 1.0\n*/",
        );
        fx.write(
            "content/plugins/hello.php",
            "<?php\n/*\nPlugin Name: Hello Dolly\nVersion: 1.7.2\n*/",
        );
        fx
    }

    #[test]
    fn test_list_and_list_slugs() {
        let fx = fixture();
        fx.run(activate, "hello.php");
        assert_eq!(
            fx.run(list, ""),
            "OK:List\n\
             akismet/akismet.php:no:5.3:Akismet\n\
             akismet/extra.php:no:1.0:Akismet Extra\n\
             hello.php:yes:1.7.2:Hello Dolly\n"
        );
        assert_eq!(
            fx.run(list_slugs, ""),
            "OK:List\nakismet:no:5.3:Akismet\nakismet:no:1.0:Akismet Extra\n"
        );
    }

    #[test]
    fn test_activate_deactivate_status() {
        let fx = fixture();
        assert_eq!(fx.run(status, "hello.php"), "STATUS:no");
        assert_eq!(fx.run(activate, "hello.php"), "OK:Activated:hello.php");
        assert_eq!(fx.run(status, "hello.php"), "STATUS:yes");
        assert_eq!(fx.run(deactivate, "hello.php"), "OK:Deactivated:hello.php");
        assert_eq!(fx.run(deactivate, "hello.php"), "OK:WasNotActive:hello.php");
        assert_eq!(fx.run(activate, "nope.php"), "ERROR:Failed:nope.php");
    }

    #[test]
    fn test_slug_operations() {
        let fx = fixture();
        assert_eq!(
            fx.run(activate_slug, "akismet"),
            "OK:Activated:akismet/akismet.php\nOK:Activated:akismet/extra.php\n"
        );
        fx.run(deactivate, "akismet/extra.php");
        assert_eq!(
            fx.run(deactivate_slug, "akismet"),
            "OK:Deactivated:akismet/akismet.php\nOK:WasNotActive:akismet/extra.php\n"
        );
        assert_eq!(fx.run(activate_slug, "zzz"), "ERROR:CouldNotFindPlugins");
        assert_eq!(fx.run(deactivate_slug, "zzz"), "ERROR:CouldNotFindPlugins");
    }

    #[test]
    fn test_site_suffix_is_rejected() {
        let fx = fixture();
        assert_eq!(fx.run(activate, "hello.php:2"), "ERROR:NotMulti");
        assert_eq!(fx.run(status, "hello.php:blog"), "ERROR:NotMulti");
        assert_eq!(fx.ctx.plugins().active().unwrap(), Vec::<String>::new());
    }
}
