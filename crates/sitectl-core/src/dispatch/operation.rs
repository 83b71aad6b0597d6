use crate::command::CommandForm;
use crate::ops::{self, Invocation, OpResult};
use crate::response::Reply;

/// Handler entry point shared by every operation.
pub type Handler = fn(&Invocation<'_>, &str, &mut Reply<'_>) -> OpResult;

/// Deprecated bare verbs and their replacements.
pub const ALIASES: &[(&str, &str)] = &[("list", "listplugins")];

/// Every command the endpoint understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Ping,
    Help,
    Die,
    AppVersion,
    DatastoreVersion,
    MaintenanceState,
    OptionGet,
    OptionAdd,
    OptionUpdate,
    OptionDelete,
    UserList,
    UserListDetailed,
    UserAdd,
    UserDelete,
    UserDeleteById,
    PasswordReset,
    GetFile,
    DiskUsage,
    FindFilesMd5,
    FindFilesPlain,
    DeleteFile,
    DeleteDir,
    EmptyDir,
    DeletePluginDir,
    DeleteThemeDir,
    ListPlugins,
    ListSlugs,
    PluginStatus,
    Activate,
    Deactivate,
    ActivateSlug,
    DeactivateSlug,
    DbDump,
    DbSearchReplace,
}

impl Operation {
    pub const ALL: [Operation; 34] = [
        Self::Ping,
        Self::Help,
        Self::Die,
        Self::AppVersion,
        Self::DatastoreVersion,
        Self::MaintenanceState,
        Self::OptionGet,
        Self::OptionAdd,
        Self::OptionUpdate,
        Self::OptionDelete,
        Self::UserList,
        Self::UserListDetailed,
        Self::UserAdd,
        Self::UserDelete,
        Self::UserDeleteById,
        Self::PasswordReset,
        Self::GetFile,
        Self::DiskUsage,
        Self::FindFilesMd5,
        Self::FindFilesPlain,
        Self::DeleteFile,
        Self::DeleteDir,
        Self::EmptyDir,
        Self::DeletePluginDir,
        Self::DeleteThemeDir,
        Self::ListPlugins,
        Self::ListSlugs,
        Self::PluginStatus,
        Self::Activate,
        Self::Deactivate,
        Self::ActivateSlug,
        Self::DeactivateSlug,
        Self::DbDump,
        Self::DbSearchReplace,
    ];

    /// Wire name.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Help => "help",
            Self::Die => "die",
            Self::AppVersion => "wpversion",
            Self::DatastoreVersion => "mysqlversion",
            Self::MaintenanceState => "maintenancestate",
            Self::OptionGet => "optget",
            Self::OptionAdd => "optadd",
            Self::OptionUpdate => "optupdate",
            Self::OptionDelete => "optdel",
            Self::UserList => "userlist",
            Self::UserListDetailed => "userlistdetailed",
            Self::UserAdd => "useradd",
            Self::UserDelete => "userdel",
            Self::UserDeleteById => "userdelid",
            Self::PasswordReset => "passwordreset",
            Self::GetFile => "getfile",
            Self::DiskUsage => "diskusage",
            Self::FindFilesMd5 => "findfiles5",
            Self::FindFilesPlain => "findfiles0",
            Self::DeleteFile => "delfile",
            Self::DeleteDir => "deldir",
            Self::EmptyDir => "emptydir",
            Self::DeletePluginDir => "delplugdir",
            Self::DeleteThemeDir => "delthemedir",
            Self::ListPlugins => "listplugins",
            Self::ListSlugs => "listslugs",
            Self::PluginStatus => "status",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::ActivateSlug => "actislug",
            Self::DeactivateSlug => "deactislug",
            Self::DbDump => "dbdump",
            Self::DbSearchReplace => "dbsearchreplace",
        }
    }

    /// The one command shape this operation answers to.
    pub fn form(&self) -> CommandForm {
        match self {
            Self::Ping
            | Self::Help
            | Self::Die
            | Self::AppVersion
            | Self::DatastoreVersion
            | Self::MaintenanceState
            | Self::UserList
            | Self::UserListDetailed
            | Self::ListPlugins
            | Self::ListSlugs
            | Self::DbDump => CommandForm::Bare,
            _ => CommandForm::WithArgument,
        }
    }

    /// Replies consumed verbatim by the caller; no `AUTHOK:` prefix.
    pub fn streams_raw(&self) -> bool {
        matches!(self, Self::GetFile | Self::DbDump)
    }

    /// Usage line for `help`.
    pub fn usage(&self) -> String {
        let args = match self {
            Self::OptionGet | Self::OptionDelete => "<option>",
            Self::OptionAdd | Self::OptionUpdate => "<option>:<value>",
            Self::UserAdd => "<username>:<role>:<email>",
            Self::UserDelete => "<username|email>[,<username|email|@admin|novalue>]",
            Self::UserDeleteById => "<id>",
            Self::PasswordReset => "<username|email>",
            Self::GetFile | Self::DiskUsage | Self::DeleteFile => "<path>",
            Self::DeleteDir | Self::EmptyDir => "<dir>",
            Self::DeletePluginDir | Self::DeleteThemeDir => "<dirname>",
            Self::FindFilesMd5 | Self::FindFilesPlain => "<depth>:<path>",
            Self::PluginStatus | Self::Activate | Self::Deactivate => "<plugin>",
            Self::ActivateSlug | Self::DeactivateSlug => "<slug>",
            Self::DbSearchReplace => "<search>^<replace>[:<tables>]",
            _ => return self.verb().to_string(),
        };
        format!("{}:{args}", self.verb())
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Self::Ping => "liveness check with interface, runtime, application and datastore versions",
            Self::Help => "this list",
            Self::Die => "permanently revoke this endpoint's credential",
            Self::AppVersion => "application version",
            Self::DatastoreVersion => "datastore server version",
            Self::MaintenanceState => "whether the site is in maintenance mode",
            Self::OptionGet => "print an option",
            Self::OptionAdd => "add an option",
            Self::OptionUpdate => "add or update an option",
            Self::OptionDelete => "delete an option",
            Self::UserList => "list user logins",
            Self::UserListDetailed => "list users with email and role",
            Self::UserAdd => "create a user with a random password",
            Self::UserDelete => "delete a user, reassigning or deleting their content",
            Self::UserDeleteById => "delete a user by id along with their content",
            Self::PasswordReset => "set a new random password",
            Self::GetFile => "dump a file verbatim",
            Self::DiskUsage => "bytes used under a path",
            Self::FindFilesMd5 => "list files with MD5 checksums (depth 0: unlimited; -2: skip content dir and endpoint file)",
            Self::FindFilesPlain => "like findfiles5 with zeroed checksums",
            Self::DeleteFile => "delete a file",
            Self::DeleteDir => "recursively delete a directory",
            Self::EmptyDir => "leave an empty directory",
            Self::DeletePluginDir => "recursively delete a plugin directory",
            Self::DeleteThemeDir => "recursively delete a theme directory",
            Self::ListPlugins => "list plugins by file",
            Self::ListSlugs => "list plugins by directory",
            Self::PluginStatus => "whether a plugin is active",
            Self::Activate => "activate a plugin",
            Self::Deactivate => "deactivate a plugin",
            Self::ActivateSlug => "activate every plugin under a directory",
            Self::DeactivateSlug => "deactivate every plugin under a directory",
            Self::DbDump => "SQL dump of the application's tables",
            Self::DbSearchReplace => "search and replace across tables, including inside serialized data",
        }
    }

    pub fn handler(&self) -> Handler {
        match self {
            Self::Ping => ops::system::ping,
            Self::Help => ops::system::help,
            Self::Die => ops::system::die,
            Self::AppVersion => ops::system::app_version,
            Self::DatastoreVersion => ops::system::datastore_version,
            Self::MaintenanceState => ops::system::maintenance_state,
            Self::OptionGet => ops::options::get,
            Self::OptionAdd => ops::options::add,
            Self::OptionUpdate => ops::options::update,
            Self::OptionDelete => ops::options::delete,
            Self::UserList => ops::users::list,
            Self::UserListDetailed => ops::users::list_detailed,
            Self::UserAdd => ops::users::add,
            Self::UserDelete => ops::users::delete,
            Self::UserDeleteById => ops::users::delete_by_id,
            Self::PasswordReset => ops::users::reset_password,
            Self::GetFile => ops::files::get_file,
            Self::DiskUsage => ops::files::disk_usage_of,
            Self::FindFilesMd5 => ops::files::find_files_md5,
            Self::FindFilesPlain => ops::files::find_files_plain,
            Self::DeleteFile => ops::files::delete_file,
            Self::DeleteDir => ops::files::delete_dir,
            Self::EmptyDir => ops::files::empty_dir,
            Self::DeletePluginDir => ops::files::delete_plugin_dir,
            Self::DeleteThemeDir => ops::files::delete_theme_dir,
            Self::ListPlugins => ops::plugins::list,
            Self::ListSlugs => ops::plugins::list_slugs,
            Self::PluginStatus => ops::plugins::status,
            Self::Activate => ops::plugins::activate,
            Self::Deactivate => ops::plugins::deactivate,
            Self::ActivateSlug => ops::plugins::activate_slug,
            Self::DeactivateSlug => ops::plugins::deactivate_slug,
            Self::DbDump => ops::database::dump,
            Self::DbSearchReplace => ops::database::search_replace,
        }
    }

    /// Exact-match lookup. Aliases apply to bare verbs only.
    pub fn resolve(verb: &str, form: CommandForm) -> Option<Operation> {
        let verb = match form {
            CommandForm::Bare => ALIASES
                .iter()
                .find(|(alias, _)| *alias == verb)
                .map_or(verb, |(_, canonical)| *canonical),
            CommandForm::WithArgument => verb,
        };
        Self::ALL
            .into_iter()
            .find(|op| op.form() == form && op.verb() == verb)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.verb())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_verbs_are_unique() {
        let verbs: HashSet<_> = Operation::ALL.iter().map(Operation::verb).collect();
        assert_eq!(verbs.len(), Operation::ALL.len());
    }

    #[test]
    fn test_resolve_respects_form() {
        assert_eq!(Operation::resolve("ping", CommandForm::Bare), Some(Operation::Ping));
        assert_eq!(Operation::resolve("ping", CommandForm::WithArgument), None);
        assert_eq!(
            Operation::resolve("optget", CommandForm::WithArgument),
            Some(Operation::OptionGet)
        );
        assert_eq!(Operation::resolve("optget", CommandForm::Bare), None);
        assert_eq!(Operation::resolve("", CommandForm::Bare), None);
    }

    #[test]
    fn test_alias_applies_to_bare_form_only() {
        assert_eq!(Operation::resolve("list", CommandForm::Bare), Some(Operation::ListPlugins));
        assert_eq!(Operation::resolve("list", CommandForm::WithArgument), None);
    }

    #[test]
    fn test_raw_streams() {
        let raw: Vec<_> = Operation::ALL.into_iter().filter(Operation::streams_raw).collect();
        assert_eq!(raw, vec![Operation::GetFile, Operation::DbDump]);
    }

    #[test]
    fn test_usage_lines() {
        assert_eq!(Operation::Ping.usage(), "ping");
        assert_eq!(Operation::FindFilesMd5.usage(), "findfiles5:<depth>:<path>");
    }
}
