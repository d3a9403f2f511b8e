// Copyright 2018 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::io::{Error, Result};
use std::net::{Ipv4Addr, TcpListener};
use std::os::unix::io::{FromRawFd, RawFd};

/// Builds the listening socket the accept loop runs on: IPv4, stream,
/// `SO_REUSEADDR` set before bind so quick restarts do not trip over
/// TIME_WAIT.
///
/// An empty `host` binds all interfaces.
pub fn bind_tcp_listener(host: &str, port: u16, backlog: i32) -> Result<TcpListener> {
    let ip: Ipv4Addr = if host.is_empty() {
        Ipv4Addr::UNSPECIFIED
    } else {
        host.parse()
            .map_err(|_| Error::new(std::io::ErrorKind::InvalidInput, "invalid bind host"))?
    };

    // SAFETY: plain socket syscalls on a fd we own; the fd is closed on every
    // error path and otherwise handed to TcpListener.
    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0);
        if fd < 0 {
            return Err(Error::last_os_error());
        }

        let one: libc::c_int = 1;
        if libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &one as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        ) < 0
        {
            return Err(close_on_error(fd));
        }

        let addr = libc::sockaddr_in {
            sin_family: libc::AF_INET as libc::sa_family_t,
            sin_port: port.to_be(),
            sin_addr: libc::in_addr {
                s_addr: u32::from(ip).to_be(),
            },
            sin_zero: [0; 8],
        };
        if libc::bind(
            fd,
            &addr as *const libc::sockaddr_in as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        ) < 0
        {
            return Err(close_on_error(fd));
        }

        if libc::listen(fd, backlog) < 0 {
            return Err(close_on_error(fd));
        }

        Ok(TcpListener::from_raw_fd(fd))
    }
}

fn close_on_error(fd: RawFd) -> Error {
    let err = Error::last_os_error();
    // SAFETY: fd came from a successful socket() call and is not yet owned
    // by any wrapper.
    unsafe {
        libc::close(fd);
    }
    err
}
