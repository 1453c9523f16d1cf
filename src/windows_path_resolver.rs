use crate::*;
use crate::file_system::{check_mount_point, mount_point_entry};
use crate::find_spec::fold;

use std::collections::HashMap;

/// Resolves Windows paths to path specifications on one file system, and
/// back.
///
/// Accepted forms are drive-absolute (`C:\Windows`), device
/// (`\\?\C:\Windows`, `\\.\C:\Windows`) and volume-absolute (`\Windows`)
/// paths, optionally starting with `%VARIABLE%` segments. Any drive letter
/// names the volume the resolver is bound to. UNC paths and relative paths
/// never resolve. Names are looked up case-insensitively, preferring an
/// exact match.
///
/// ```rust
/// # use layered_vfs::*;
/// let fs = FakeFileSystem::from_listing(&[
///     ("/Windows/System32/config/SYSTEM", b"regf"),
/// ]).unwrap();
/// let mut resolver = WindowsPathResolver::new(&fs, PathSpec::fake("/")
///                                             .unwrap()).unwrap();
/// resolver.set_environment_variable("SystemRoot", "C:\\Windows");
/// let path_spec = resolver
///     .resolve_path("%systemroot%\\system32\\CONFIG\\system").unwrap()
///     .unwrap();
/// assert_eq!(path_spec.location(), Some("/Windows/System32/config/SYSTEM"));
/// assert_eq!(resolver.get_windows_path(&path_spec).unwrap(),
///            "C:\\Windows\\System32\\config\\SYSTEM");
/// ```
pub struct WindowsPathResolver<'a> {
    file_system: &'a dyn FileSystem,
    mount_point: PathSpec,
    environment_variables: HashMap<String, String>,
}

impl<'a> WindowsPathResolver<'a> {
    /// Binds a resolver to `file_system`. As with the searcher, parentless
    /// file system types resolve from `mount_point`, which must carry a
    /// location.
    pub fn new(file_system: &'a dyn FileSystem, mount_point: PathSpec)
        -> Result<WindowsPathResolver<'a>> {
        check_mount_point(file_system, &mount_point)?;
        Ok(WindowsPathResolver {
            file_system,
            mount_point,
            environment_variables: HashMap::new(),
        })
    }
    pub fn mount_point(&self) -> &PathSpec { &self.mount_point }
    /// Sets the value `%name%` expands to. Names are case-insensitive. A
    /// trailing backslash on the value is dropped.
    pub fn set_environment_variable(&mut self, name: &str, value: &str) {
        self.environment_variables.insert(name.to_uppercase(),
                                          value.trim_end_matches('\\')
                                          .to_string());
    }
    /// Finds the entry a Windows path names. Returns `Ok(None)` if the path
    /// is of a form that cannot resolve (relative, UNC, an unknown
    /// variable) or nothing exists there.
    pub fn resolve_path(&self, windows_path: &str)
        -> Result<Option<PathSpec>> {
        let segments = match self.absolute_segments(windows_path) {
            Some(x) => x,
            None => {
                log::debug!("cannot resolve Windows path {:?}", windows_path);
                return Ok(None)
            },
        };
        let mut entry = mount_point_entry(self.file_system,
                                          &self.mount_point)?;
        for segment in segments {
            let wanted = fold(&segment, false);
            let mut found = None;
            for child in entry.sub_file_entries()? {
                let child = child?;
                if child.name() == segment {
                    found = Some(child);
                    break
                }
                if found.is_none() && fold(child.name(), false) == wanted {
                    found = Some(child);
                }
            }
            match found {
                Some(x) => entry = x,
                None => return Ok(None),
            }
        }
        Ok(Some(entry.path_spec().clone()))
    }
    /// The drive-absolute Windows path of `path_spec`, or `None` if it is
    /// not on this file system (or not below the mount point).
    pub fn get_windows_path(&self, path_spec: &PathSpec) -> Option<String> {
        if path_spec.type_indicator() != self.file_system.type_indicator() {
            return None
        }
        let mut segments = self.file_system.split_path(path_spec.location()?);
        if self.file_system.type_indicator().is_parentless() {
            let mount = self.file_system
                .split_path(self.mount_point.location()?);
            if !segments.starts_with(&mount) { return None }
            segments.drain(.. mount.len());
        }
        Some(format!("C:\\{}", segments.join("\\")))
    }
    /// Segments below the volume root, with variables expanded and `.` and
    /// `..` applied. `..` at the root stays at the root.
    fn absolute_segments(&self, windows_path: &str) -> Option<Vec<String>> {
        let path = self.expand(windows_path)?;
        let rest = if let Some(rest) = path.strip_prefix("\\\\?\\")
            .or_else(|| path.strip_prefix("\\\\.\\")) {
            strip_drive(rest)?
        }
        else if path.starts_with("\\\\") { return None }
        else if let Some(rest) = strip_drive(&path) { rest }
        else if path.starts_with('\\') { &path[..] }
        else { return None };
        let mut segments = vec![];
        for segment in rest.split('\\') {
            match segment {
                "" | "." => (),
                ".." => { segments.pop(); },
                x => segments.push(x.to_string()),
            }
        }
        Some(segments)
    }
    fn expand(&self, windows_path: &str) -> Option<String> {
        let mut ret = String::with_capacity(windows_path.len());
        for (n, segment) in windows_path.split('\\').enumerate() {
            if n > 0 { ret.push('\\') }
            match segment.strip_prefix('%').and_then(|x| x.strip_suffix('%')) {
                Some(name) if !name.is_empty() => {
                    ret.push_str(self.environment_variables
                                 .get(&name.to_uppercase())?);
                },
                _ => ret.push_str(segment),
            }
        }
        Some(ret)
    }
}

/// Strips a leading `X:` and returns the rest, which must be empty or start
/// at the root. `C:foo` is relative to the drive's working directory and
/// does not count.
fn strip_drive(path: &str) -> Option<&str> {
    let mut chars = path.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic() => (),
        _ => return None,
    }
    let rest = &path[2..];
    if rest.is_empty() || rest.starts_with('\\') { Some(rest) }
    else { None }
}

#[cfg(all(test, feature = "fake"))]
mod test {
    use super::*;
    const GUID: &str = "{3808876b-c176-4e48-b7ae-04046e6cc752}";
    fn image() -> FakeFileSystem {
        FakeFileSystem::from_listing(&[
            ("/System Volume Information/\
              {3808876b-c176-4e48-b7ae-04046e6cc752}", b"store"),
            ("/syslog.gz", b"\x1f\x8b"),
            ("/testdir/file1.txt", b"one"),
            ("/testdir/FILE1.TXT", b"shouty one"),
        ]).unwrap()
    }
    fn root() -> PathSpec { PathSpec::fake("/").unwrap() }
    #[test] fn forms() {
        let fs = image();
        let resolver = WindowsPathResolver::new(&fs, root()).unwrap();
        let store = format!("/System Volume Information/{}", GUID);
        let paths_to_check: &[(String, Option<&str>)] = &[
            (format!("C:\\System Volume Information\\{}", GUID),
             Some(store.as_str())),
            (format!("\\\\?\\C:\\System Volume Information\\{}", GUID),
             Some(store.as_str())),
            (format!("\\\\.\\C:\\System Volume Information\\{}", GUID),
             Some(store.as_str())),
            ("\\SYSLOG.GZ".into(), Some("/syslog.gz")),
            ("C:\\..\\SYSLOG.GZ".into(), Some("/syslog.gz")),
            ("D:\\testdir\\.\\x\\..\\file1.txt".into(),
             Some("/testdir/file1.txt")),
            ("C:\\testdir\\FILE1.TXT".into(), Some("/testdir/FILE1.TXT")),
            ("C:\\testdir\\file1.txt".into(), Some("/testdir/file1.txt")),
            ("C:\\SysLog.Gz".into(), Some("/syslog.gz")),
            ("\\".into(), Some("/")),
            ("C:".into(), Some("/")),
            ("C:\\testdir\\file6.txt".into(), None),
            ("C:\\syslog.gz\\beneath".into(), None),
            ("S".into(), None),
            ("\\\\?\\".into(), None),
            ("\\\\.\\".into(), None),
            ("\\\\?\\UNC\\server\\share\\directory\\file.txt".into(), None),
            ("\\\\server\\share\\directory\\file.txt".into(), None),
            ("SYSLOG.GZ".into(), None),
            (".\\SYSLOG.GZ".into(), None),
            ("..\\SYSLOG.GZ".into(), None),
            ("C:SYSLOG.GZ".into(), None),
        ];
        for (windows_path, expected) in paths_to_check {
            let found = resolver.resolve_path(windows_path).unwrap();
            assert_eq!(found.as_ref().and_then(|x| x.location()), *expected,
                       "{:?}", windows_path);
        }
    }
    #[test] fn back_to_windows() {
        let fs = image();
        let resolver = WindowsPathResolver::new(&fs, root()).unwrap();
        let windows_path = format!("C:\\System Volume Information\\{}", GUID);
        let path_spec = resolver.resolve_path(&windows_path).unwrap()
            .unwrap();
        assert_eq!(resolver.get_windows_path(&path_spec).unwrap(),
                   windows_path);
        assert_eq!(resolver.get_windows_path(&root()).unwrap(), "C:\\");
        let elsewhere = PathSpec::os("/syslog.gz").unwrap();
        assert_eq!(resolver.get_windows_path(&elsewhere), None);
    }
    #[test] fn environment_variables() {
        let fs = image();
        let mut resolver = WindowsPathResolver::new(&fs, root()).unwrap();
        resolver.set_environment_variable("SystemRoot",
                                          "C:\\System Volume Information\\");
        let path_spec = resolver
            .resolve_path(&format!("%SystemRoot%\\{}", GUID)).unwrap()
            .unwrap();
        assert_eq!(path_spec.location(),
                   Some(&format!("/System Volume Information/{}", GUID)[..]));
        assert_eq!(resolver.get_windows_path(&path_spec).unwrap(),
                   format!("C:\\System Volume Information\\{}", GUID));
        assert!(resolver.resolve_path(&format!("%WinDir%\\{}", GUID))
                .unwrap().is_none());
        // a lone percent sign is just a name
        assert!(resolver.resolve_path("C:\\%").unwrap().is_none());
    }
    #[test] fn below_a_mount_point() {
        let fs = FakeFileSystem::from_listing(&[
            ("/mnt/c/Windows/notepad.exe", b"MZ"),
            ("/Windows/notepad.exe", b"wrong volume"),
        ]).unwrap();
        let resolver = WindowsPathResolver::new(&fs, PathSpec::fake("/mnt/c")
                                                .unwrap()).unwrap();
        let path_spec = resolver.resolve_path("C:\\WINDOWS\\Notepad.exe")
            .unwrap().unwrap();
        assert_eq!(path_spec.location(), Some("/mnt/c/Windows/notepad.exe"));
        assert_eq!(resolver.get_windows_path(&path_spec).unwrap(),
                   "C:\\Windows\\notepad.exe");
        let outside = PathSpec::fake("/Windows/notepad.exe").unwrap();
        assert_eq!(resolver.get_windows_path(&outside), None);
        let unlocated = PathSpec::new(TypeIndicator::FAKE, Default::default(),
                                      None).unwrap();
        assert!(matches!(WindowsPathResolver::new(&fs, unlocated),
                         Err(Error::InvalidArgument(..))));
    }
    #[test] fn denied_directories() {
        let mut fs = image();
        fs.deny_access("/testdir").unwrap();
        let resolver = WindowsPathResolver::new(&fs, root()).unwrap();
        assert!(matches!(resolver.resolve_path("C:\\testdir\\file1.txt"),
                         Err(Error::AccessDenied(..))));
    }
}
