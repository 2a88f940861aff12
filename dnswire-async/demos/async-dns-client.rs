use std::{env, io, net::SocketAddr};

use dnswire_async::{
    dnswire::{
        packet::{DomainName, Message, QType, Question},
        Config,
    },
    AsyncTcpClient, AsyncUdpClient,
};
use futures_lite::future;
use log::LevelFilter;

fn main() -> io::Result<()> {
    env_logger::Builder::new()
        .filter_module("dnswire", LevelFilter::Debug)
        .filter_module("dnswire_async", LevelFilter::Trace)
        .filter_module(env!("CARGO_CRATE_NAME"), LevelFilter::Trace)
        .init();

    let name = env::args().nth(1).unwrap_or_else(|| "example.com".into());
    let name = DomainName::from_str(&name)?;
    let server: SocketAddr = "8.8.8.8:53".parse().unwrap();

    future::block_on(async {
        let udp = AsyncUdpClient::with_config(server, Config::default().with_assign_ids(true))?;
        let (a, aaaa) = future::zip(
            udp.query(Message::query(0, Question::new(name.clone(), QType::A))),
            udp.query(Message::query(0, Question::new(name.clone(), QType::AAAA))),
        )
        .await;
        println!("{}", a?);
        println!("{}", aaaa?);

        let tcp = AsyncTcpClient::connect(server).await?;
        let mx = tcp
            .query(Message::query(0x4d58, Question::new(name, QType::MX)))
            .await?;
        println!("{}", mx);
        Ok::<_, io::Error>(())
    })
}
