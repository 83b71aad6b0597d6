use super::{Invocation, OpResult};
use crate::app::accounts::{generate_password, lookup};
use crate::app::Reassign;
use crate::response::Reply;

/// Reassign value meaning "delete the user's content".
const NO_REASSIGN: &str = "novalue";

/// Reassign value meaning "the administrator with the lowest id".
const FIRST_ADMIN: &str = "@admin";

pub fn list(inv: &Invocation<'_>, _arg: &str, reply: &mut Reply<'_>) -> OpResult {
    for account in inv.ctx.accounts().list()? {
        reply.text("\n")?;
        reply.text(&account.login)?;
    }
    Ok(())
}

pub fn list_detailed(inv: &Invocation<'_>, _arg: &str, reply: &mut Reply<'_>) -> OpResult {
    for account in inv.ctx.accounts().list()? {
        let role = if account.role.is_empty() { "unknown" } else { account.role.as_str() };
        reply.text(&format!(
            "\nLogin:{} Email:{} Role:{}",
            account.login, account.email, role
        ))?;
    }
    Ok(())
}

/// `useradd:<login>:<role>:<email>`
pub fn add(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    let mut parts = arg.splitn(3, ':');
    let (Some(login), Some(role), Some(email)) = (parts.next(), parts.next(), parts.next()) else {
        reply.syntax_error()?;
        return Ok(());
    };
    if login.is_empty() || role.is_empty() {
        reply.syntax_error()?;
        return Ok(());
    }

    let accounts = inv.ctx.accounts();
    let email_taken = !email.is_empty() && accounts.find_by_email(email)?.is_some();
    if email_taken || accounts.find_by_login(login)?.is_some() {
        reply.text("ERROR:One of the username or email address already exists.")?;
        return Ok(());
    }

    let password = generate_password();
    match accounts.create(login, email, role, &password) {
        Ok(id) => {
            tracing::info!(login, id, "account created");
            reply.text(&format!("ADDED:{password}:{id}"))?;
        }
        Err(e) => reply.text(&format!("ERROR:Unknown Error:{e}"))?,
    }
    Ok(())
}

/// `userdel:<who>[,<reassign>]` where reassign is a login, an email,
/// `@admin`, or `novalue` to delete the user's content.
pub fn delete(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    let (who, reassign) = match arg.split_once(',') {
        Some((who, reassign)) if !who.is_empty() && !reassign.is_empty() => (who, reassign),
        _ => (arg, NO_REASSIGN),
    };

    let accounts = inv.ctx.accounts();
    let Some(account) = lookup(accounts, who)? else {
        reply.error("NOSUCHUSER")?;
        return Ok(());
    };

    let reassign = match reassign {
        NO_REASSIGN => Reassign::Delete,
        FIRST_ADMIN => match accounts.first_admin()? {
            Some(admin) => Reassign::To(admin.id),
            None => {
                reply.error("NOSUCHAUSER")?;
                return Ok(());
            }
        },
        other => match lookup(accounts, other)? {
            Some(target) => Reassign::To(target.id),
            None => {
                reply.error("NOSUCHRUSER")?;
                return Ok(());
            }
        },
    };

    delete_account(inv, account.id, reassign, reply)
}

/// `userdelid:<id>`; the user's content is deleted.
pub fn delete_by_id(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    match arg.trim().parse::<i64>() {
        Ok(id) => delete_account(inv, id, Reassign::Delete, reply),
        Err(_) => {
            reply.syntax_error()?;
            Ok(())
        }
    }
}

fn delete_account(inv: &Invocation<'_>, id: i64, reassign: Reassign, reply: &mut Reply<'_>) -> OpResult {
    if inv.ctx.accounts().delete(id, reassign)? {
        tracing::info!(id, ?reassign, "account deleted");
        reply.text("DELETED")?;
    } else {
        reply.text("ERROR;")?;
    }
    Ok(())
}

pub fn reset_password(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    let accounts = inv.ctx.accounts();
    let Some(account) = lookup(accounts, arg)? else {
        reply.error("NOSUCHUSER")?;
        return Ok(());
    };
    let password = generate_password();
    accounts.set_password(account.id, &password)?;
    reply.text(&format!("PWCHANGED:{password}"))?;
    Ok(())
}
