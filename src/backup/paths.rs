use super::{SkipReason, SkippedSource, SourceSet};
use crate::error::{BackupError, Result};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

pub type AccessCheck = Box<dyn Fn(&Path) -> std::result::Result<(), SkipReason> + Send + Sync>;

/// Home directory of a named account, for `~name` paths.
pub type UserHomes = Box<dyn Fn(&str) -> Option<PathBuf> + Send + Sync>;

const PASSWD_PATH: &str = "/etc/passwd";

/// Expands user-supplied paths and decides which of them can be used.
pub struct PathResolver {
    home: Option<PathBuf>,
    cwd: PathBuf,
    access: AccessCheck,
    user_homes: UserHomes,
}

impl PathResolver {
    /// Resolver bound to the real home directory, working directory and filesystem.
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| BackupError::Config {
            message: format!("cannot determine working directory: {e}"),
        })?;
        Ok(Self::new(dirs::home_dir(), cwd, Box::new(check_readable)))
    }

    pub fn new(home: Option<PathBuf>, cwd: PathBuf, access: AccessCheck) -> Self {
        Self {
            home,
            cwd,
            access,
            user_homes: Box::new(lookup_user_home),
        }
    }

    pub fn with_user_homes(mut self, user_homes: UserHomes) -> Self {
        self.user_homes = user_homes;
        self
    }

    /// Absolute, lexically normalised form of `raw` (`~` and `~name` expanded,
    /// relative joined to cwd). An unknown `~name` is left as a relative path.
    pub fn expand(&self, raw: &str) -> PathBuf {
        let joined = match self.expand_tilde(raw) {
            Some(path) => path,
            None => {
                let path = Path::new(raw);
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    self.cwd.join(path)
                }
            }
        };
        normalize(&joined)
    }

    fn expand_tilde(&self, raw: &str) -> Option<PathBuf> {
        let rest = raw.strip_prefix('~')?;
        let (user, tail) = match rest.split_once('/') {
            Some((user, tail)) => (user, tail),
            None => (rest, ""),
        };
        let home = if user.is_empty() {
            self.home.clone()?
        } else {
            (self.user_homes)(user)?
        };
        Some(if tail.is_empty() { home } else { home.join(tail) })
    }

    pub fn resolve(&self, raw: &str) -> std::result::Result<PathBuf, SkippedSource> {
        let path = self.expand(raw);
        match (self.access)(&path) {
            Ok(()) => Ok(path),
            Err(reason) => Err(SkippedSource { path, reason }),
        }
    }

    /// First accessible candidate, in order.
    pub fn resolve_destination(&self, candidates: &[String]) -> Result<PathBuf> {
        for candidate in candidates {
            match self.resolve(candidate) {
                Ok(path) => {
                    info!(destination = %path.display(), "Backup destination resolved");
                    return Ok(path);
                }
                Err(skipped) => {
                    debug!(candidate = %skipped.path.display(), reason = %skipped.reason, "Destination candidate unavailable");
                }
            }
        }
        Err(BackupError::NoDestinationAvailable {
            tried: candidates.len(),
        })
    }

    /// Partitions every candidate into reachable and skipped. Never fails on its own;
    /// see [`SourceSet::ensure_reachable`].
    pub fn resolve_sources(&self, candidates: &[String]) -> SourceSet {
        let mut set = SourceSet::default();
        for candidate in candidates {
            match self.resolve(candidate) {
                Ok(path) => set.reachable.push(path),
                Err(skipped) => {
                    warn!(source = %skipped.path.display(), reason = %skipped.reason, "Skipping inaccessible source");
                    set.skipped.push(skipped);
                }
            }
        }
        set
    }
}

/// Reads the account database the way `getpwnam` would for local users.
pub fn lookup_user_home(user: &str) -> Option<PathBuf> {
    let passwd = std::fs::read_to_string(PASSWD_PATH).ok()?;
    home_from_passwd(&passwd, user)
}

fn home_from_passwd(passwd: &str, user: &str) -> Option<PathBuf> {
    passwd
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(|line| line.split(':').collect::<Vec<_>>())
        .find(|fields| fields.len() >= 6 && fields[0] == user)
        .map(|fields| PathBuf::from(fields[5]))
        .filter(|home| home.is_absolute())
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if out.parent().is_some() {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Exists and is readable by the current user: directories must list, files must open.
pub fn check_readable(path: &Path) -> std::result::Result<(), SkipReason> {
    let metadata = std::fs::metadata(path).map_err(|e| reason_for(&e))?;
    if metadata.is_dir() {
        std::fs::read_dir(path).map(|_| ()).map_err(|e| reason_for(&e))
    } else {
        std::fs::File::open(path).map(|_| ()).map_err(|e| reason_for(&e))
    }
}

fn reason_for(err: &std::io::Error) -> SkipReason {
    match err.kind() {
        std::io::ErrorKind::NotFound => SkipReason::Missing,
        std::io::ErrorKind::PermissionDenied => SkipReason::PermissionDenied,
        _ => SkipReason::Unreadable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn resolver_with(accessible: &[&str]) -> PathResolver {
        let set: HashSet<PathBuf> = accessible.iter().map(PathBuf::from).collect();
        PathResolver::new(
            Some(PathBuf::from("/home/andy")),
            PathBuf::from("/work"),
            Box::new(move |p: &Path| {
                if set.contains(p) {
                    Ok(())
                } else {
                    Err(SkipReason::Missing)
                }
            }),
        )
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_expand_home_and_relative() {
        let resolver = resolver_with(&[]);
        assert_eq!(resolver.expand("~"), PathBuf::from("/home/andy"));
        assert_eq!(
            resolver.expand("~/Documents/"),
            PathBuf::from("/home/andy/Documents")
        );
        assert_eq!(resolver.expand("notes"), PathBuf::from("/work/notes"));
        assert_eq!(resolver.expand("../srv/./www"), PathBuf::from("/srv/www"));
        assert_eq!(resolver.expand("/../../etc"), PathBuf::from("/etc"));
    }

    #[test]
    fn test_expand_named_user_home() {
        let resolver = resolver_with(&[]).with_user_homes(Box::new(|user: &str| {
            (user == "bob").then(|| PathBuf::from("/users/bob"))
        }));
        assert_eq!(resolver.expand("~bob"), PathBuf::from("/users/bob"));
        assert_eq!(resolver.expand("~bob/music/"), PathBuf::from("/users/bob/music"));
        assert_eq!(resolver.expand("~nobody/x"), PathBuf::from("/work/~nobody/x"));
    }

    #[test]
    fn test_home_from_passwd() {
        let passwd = "# local accounts\n\
                      root:x:0:0:root:/root:/bin/bash\n\
                      bob:x:1000:1000:Bob,,,:/home/bob:/bin/zsh\n\
                      broken:x:1001\n";
        assert_eq!(home_from_passwd(passwd, "bob"), Some(PathBuf::from("/home/bob")));
        assert_eq!(home_from_passwd(passwd, "root"), Some(PathBuf::from("/root")));
        assert_eq!(home_from_passwd(passwd, "broken"), None);
        assert_eq!(home_from_passwd(passwd, "alice"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_check_readable_reports_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users read through the mode bits.
        let privileged = std::fs::read_dir(&locked).is_ok();
        let result = check_readable(&locked);
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        if !privileged {
            assert_eq!(result, Err(SkipReason::PermissionDenied));
        }
    }

    #[test]
    fn test_expand_keeps_spaces_and_quotes() {
        let resolver = resolver_with(&[]);
        assert_eq!(
            resolver.expand("/back up/it's here/"),
            PathBuf::from("/back up/it's here")
        );
    }

    #[test]
    fn test_first_accessible_destination_wins() {
        let resolver = resolver_with(&["/valid", "/also-valid"]);
        let dest = resolver
            .resolve_destination(&strings(&["/missing", "/valid", "/also-valid"]))
            .unwrap();
        assert_eq!(dest, PathBuf::from("/valid"));
    }

    #[test]
    fn test_no_destination_available() {
        let resolver = resolver_with(&[]);
        let err = resolver
            .resolve_destination(&strings(&["/a", "/b"]))
            .unwrap_err();
        assert!(matches!(err, BackupError::NoDestinationAvailable { tried: 2 }));
    }

    #[test]
    fn test_sources_partition_names_skipped_entry() {
        let resolver = resolver_with(&["/data/a", "/data/c"]);
        let set = resolver.resolve_sources(&strings(&["/data/a", "/data/b", "/data/c"]));
        set.ensure_reachable().unwrap();
        assert_eq!(set.reachable.len(), 2);
        assert_eq!(set.skipped.len(), 1);
        assert_eq!(set.skipped[0].path, PathBuf::from("/data/b"));
        assert_eq!(set.skipped[0].reason, SkipReason::Missing);
    }

    #[test]
    fn test_no_sources_available() {
        let resolver = resolver_with(&[]);
        let set = resolver.resolve_sources(&strings(&["/x"]));
        let err = set.ensure_reachable().unwrap_err();
        assert!(matches!(err, BackupError::NoSourcesAvailable { skipped: 1 }));

        let err = resolver.resolve_sources(&[]).ensure_reachable().unwrap_err();
        assert!(matches!(err, BackupError::NoSourcesAvailable { skipped: 0 }));
    }

    #[test]
    fn test_check_readable_on_real_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("present.txt");
        std::fs::write(&file, b"x").unwrap();

        assert_eq!(check_readable(&file), Ok(()));
        assert_eq!(check_readable(dir.path()), Ok(()));
        assert_eq!(
            check_readable(&dir.path().join("absent")),
            Err(SkipReason::Missing)
        );
    }

    proptest! {
        #[test]
        fn prop_destination_is_first_accessible(flags in proptest::collection::vec(any::<bool>(), 0..8)) {
            let candidates: Vec<String> = (0..flags.len()).map(|i| format!("/dest{i}")).collect();
            let accessible: Vec<&str> = candidates
                .iter()
                .zip(&flags)
                .filter(|(_, ok)| **ok)
                .map(|(c, _)| c.as_str())
                .collect();
            let resolver = resolver_with(&accessible);

            let expected = flags.iter().position(|ok| *ok);
            match (resolver.resolve_destination(&candidates), expected) {
                (Ok(dest), Some(i)) => prop_assert_eq!(dest, PathBuf::from(&candidates[i])),
                (Err(BackupError::NoDestinationAvailable { .. }), None) => {}
                (other, _) => prop_assert!(false, "unexpected resolution {:?}", other),
            }
        }

        #[test]
        fn prop_source_partition_is_disjoint_cover(flags in proptest::collection::vec(any::<bool>(), 0..10)) {
            let candidates: Vec<String> = (0..flags.len()).map(|i| format!("/src/{i}")).collect();
            let accessible: Vec<&str> = candidates
                .iter()
                .zip(&flags)
                .filter(|(_, ok)| **ok)
                .map(|(c, _)| c.as_str())
                .collect();
            let resolver = resolver_with(&accessible);

            let set = resolver.resolve_sources(&candidates);
            prop_assert_eq!(set.total(), candidates.len());
            for skipped in &set.skipped {
                prop_assert!(!set.reachable.contains(&skipped.path));
            }
            prop_assert_eq!(set.reachable.len(), flags.iter().filter(|ok| **ok).count());
            prop_assert_eq!(set.ensure_reachable().is_ok(), flags.iter().any(|ok| *ok));
            let again = resolver.resolve_sources(&candidates);
            prop_assert_eq!(set, again);
        }
    }
}
