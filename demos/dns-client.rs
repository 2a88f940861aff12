use std::{
    env, io,
    net::{SocketAddr, UdpSocket},
    time::Duration,
};

use dnswire::{
    connection::DatagramConnection,
    framing::datagram::Envelope,
    packet::{DomainName, Message, QType, Question},
    Config, DNS_BUFFER_SIZE,
};
use log::LevelFilter;

fn main() -> io::Result<()> {
    env_logger::Builder::new()
        .filter_module("dnswire", LevelFilter::Trace)
        .filter_module(env!("CARGO_CRATE_NAME"), LevelFilter::Trace)
        .init();

    let name = env::args().nth(1).unwrap_or_else(|| "example.com".into());
    let name = DomainName::from_str(&name)?;
    let server: SocketAddr = "8.8.8.8:53".parse().unwrap();

    let sock = UdpSocket::bind("0.0.0.0:0")?;
    sock.connect(server)?;
    sock.set_read_timeout(Some(Duration::from_secs(2)))?;

    let mut conn = DatagramConnection::new(server, Config::default().with_assign_ids(true));
    let (datagram, mut pending) = conn.send(Message::query(0, Question::new(name, QType::A)))?;
    sock.send(datagram.payload())?;

    let mut buf = [0; DNS_BUFFER_SIZE];
    let response = loop {
        let len = sock.recv(&mut buf)?;
        conn.receive(Envelope::wrap(server, buf[..len].to_vec()));
        if let Some(res) = pending.try_result() {
            break res?;
        }
    };
    println!("{}", response);
    Ok(())
}
