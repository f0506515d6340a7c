use std::os::unix::net::UnixStream;

/// Credentials of the process on the far end of a connected socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCredentials {
    pub uid: u32,
    pub gid: u32,
    pub pid: u32,
}

/// Fetch the credentials of the connected peer (Linux only).
///
/// The control channel runs over a trusted local transport, but the host
/// still checks that the process on the other end is the runtime it
/// launched, not an unrelated local user. Returns `None` where the
/// platform does not expose `SO_PEERCRED`.
#[cfg(target_os = "linux")]
pub fn peer_credentials(stream: &UnixStream) -> Option<PeerCredentials> {
    use std::os::fd::AsRawFd;

    let fd = stream.as_raw_fd();

    let mut cred = libc::ucred {
        pid: 0,
        uid: 0,
        gid: 0,
    };
    let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

    // SAFETY: `cred` and `len` are valid writable pointers for the provided
    // sizes, and `fd` is an open Unix socket descriptor owned by this process.
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_PEERCRED,
            (&mut cred as *mut libc::ucred).cast::<libc::c_void>(),
            &mut len,
        )
    };

    if rc == 0 && len as usize == std::mem::size_of::<libc::ucred>() {
        Some(PeerCredentials {
            uid: cred.uid,
            gid: cred.gid,
            pid: cred.pid as u32,
        })
    } else {
        None
    }
}

#[cfg(not(target_os = "linux"))]
pub fn peer_credentials(_stream: &UnixStream) -> Option<PeerCredentials> {
    None
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn pair_reports_own_credentials() {
        let (left, _right) = UnixStream::pair().unwrap();
        let creds = peer_credentials(&left).expect("SO_PEERCRED should be available");

        // A socketpair's peer is this very process.
        assert_eq!(creds.pid, std::process::id());
        // SAFETY: getuid/getgid have no preconditions.
        assert_eq!(creds.uid, unsafe { libc::getuid() });
        assert_eq!(creds.gid, unsafe { libc::getgid() });
    }
}
