//! Owner and group name resolution against the platform user database.
//!
//! Lookups go through `getpwuid_r`/`getgrgid_r` and are memoized: walks
//! over large trees tend to see a handful of distinct uids, and the passwd
//! database does not change mid-walk in any way we care about. On platforms
//! without a user database every lookup returns `None`, which makes
//! name-based filter clauses reject and template placeholders fall back to
//! the numeric id.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::LazyLock;

static USER_CACHE: LazyLock<RwLock<HashMap<u32, Option<String>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

static GROUP_CACHE: LazyLock<RwLock<HashMap<u32, Option<String>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Resolve a uid to a user name, or `None` when the database has no entry.
pub fn user_name(uid: u32) -> Option<String> {
    if let Some(cached) = USER_CACHE.read().get(&uid) {
        return cached.clone();
    }
    let resolved = lookup_user(uid);
    USER_CACHE.write().insert(uid, resolved.clone());
    resolved
}

/// Resolve a gid to a group name, or `None` when the database has no entry.
pub fn group_name(gid: u32) -> Option<String> {
    if let Some(cached) = GROUP_CACHE.read().get(&gid) {
        return cached.clone();
    }
    let resolved = lookup_group(gid);
    GROUP_CACHE.write().insert(gid, resolved.clone());
    resolved
}

#[cfg(unix)]
fn lookup_user(uid: u32) -> Option<String> {
    use std::ffi::CStr;

    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut buf = vec![0u8; passwd_buf_size()];
    let mut result: *mut libc::passwd = std::ptr::null_mut();

    let rc = unsafe {
        libc::getpwuid_r(
            uid,
            &mut pwd,
            buf.as_mut_ptr() as *mut libc::c_char,
            buf.len(),
            &mut result,
        )
    };
    if rc != 0 || result.is_null() {
        return None;
    }

    let name = unsafe { CStr::from_ptr(pwd.pw_name) };
    name.to_str().ok().map(str::to_owned)
}

#[cfg(unix)]
fn lookup_group(gid: u32) -> Option<String> {
    use std::ffi::CStr;

    let mut grp: libc::group = unsafe { std::mem::zeroed() };
    let mut buf = vec![0u8; group_buf_size()];
    let mut result: *mut libc::group = std::ptr::null_mut();

    let rc = unsafe {
        libc::getgrgid_r(
            gid,
            &mut grp,
            buf.as_mut_ptr() as *mut libc::c_char,
            buf.len(),
            &mut result,
        )
    };
    if rc != 0 || result.is_null() {
        return None;
    }

    let name = unsafe { CStr::from_ptr(grp.gr_name) };
    name.to_str().ok().map(str::to_owned)
}

#[cfg(unix)]
fn passwd_buf_size() -> usize {
    match unsafe { libc::sysconf(libc::_SC_GETPW_R_SIZE_MAX) } {
        size if size > 0 => size as usize,
        _ => 1024,
    }
}

#[cfg(unix)]
fn group_buf_size() -> usize {
    match unsafe { libc::sysconf(libc::_SC_GETGR_R_SIZE_MAX) } {
        size if size > 0 => size as usize,
        _ => 1024,
    }
}

#[cfg(not(unix))]
fn lookup_user(_uid: u32) -> Option<String> {
    None
}

#[cfg(not(unix))]
fn lookup_group(_gid: u32) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_root_resolves() {
        // uid 0 exists on every unix system this crate targets
        assert_eq!(user_name(0).as_deref(), Some("root"));
        assert!(group_name(0).is_some());
    }

    #[test]
    fn test_unknown_uid_returns_none() {
        // Near the top of the uid space; no real system allocates it
        assert_eq!(user_name(u32::MAX - 7), None);
    }

    #[test]
    fn test_lookups_are_cached() {
        let first = user_name(0);
        let second = user_name(0);
        assert_eq!(first, second);
    }
}
