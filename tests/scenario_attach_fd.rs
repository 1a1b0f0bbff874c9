//! `Reactor::attach_fd` adopts an already-open, externally-owned raw
//! descriptor directly (no `listen_*`/`connect_*`/`accept` of its own),
//! the way a socket-activation launcher or a hot-restart re-exec would
//! hand a live descriptor to a fresh reactor.

mod util;

use std::io::{Read, Write};
use std::os::unix::io::IntoRawFd;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use revio::conn::{Protocol, ReactorOps, Uuid};
use revio::reactor::{Reactor, ReactorConfig};

struct EchoProtocol;

impl Protocol for EchoProtocol {
    fn on_data(&mut self, reactor: &dyn ReactorOps, uuid: Uuid) {
        let mut buf = [0u8; 256];
        loop {
            match reactor.read(uuid, &mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let mut reply = b"Echo: ".to_vec();
                    reply.extend_from_slice(&buf[..n]);
                    if reactor.write(uuid, reply).is_err() {
                        reactor.force_close(uuid);
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    }
}

#[test]
fn attach_fd_adopts_an_externally_owned_descriptor() {
    util::init();

    let (server_half, mut client) = assert_ok!(UnixStream::pair());
    let server_fd = server_half.into_raw_fd();

    let reactor = assert_ok!(Reactor::new(ReactorConfig::new()));
    let uuid = assert_ok!(reactor.attach_fd(server_fd, Box::new(EchoProtocol)));
    assert!(reactor.is_valid(uuid));

    let run_reactor = std::sync::Arc::clone(&reactor);
    let handle = std::thread::spawn(move || {
        let _ = run_reactor.start(|| Ok(()));
    });

    std::thread::sleep(Duration::from_millis(50));

    assert_ok!(client.write_all(b"Hi"));

    let mut response = [0u8; 64];
    let mut total = 0;
    let expected = b"Echo: Hi";
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    while total < expected.len() {
        let n = assert_ok!(client.read(&mut response[total..]));
        assert!(n > 0, "server closed before sending the full reply");
        total += n;
    }
    assert_eq!(&response[..total], expected);

    reactor.stop();
    handle.join().unwrap();
}
