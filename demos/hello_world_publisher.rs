use netbus::{AdvertiseOptions, Message, Node, NodeOptions, SharedContext};

#[derive(Clone)]
struct HelloWorldType {
    id: u8,
    msg: String,
}

impl Message for HelloWorldType {
    fn type_name() -> &'static str {
        "HelloWorldType"
    }

    fn to_bytes(&self) -> Result<Vec<u8>, String> {
        let mut bytes = vec![self.id];
        bytes.extend_from_slice(self.msg.as_bytes());
        Ok(bytes)
    }
}

fn main() {
    let context = SharedContext::process_default();
    let node = Node::new(NodeOptions::default(), context);
    println!("{:?} [P] Created node", std::time::SystemTime::now());

    let publisher = node
        .advertise::<HelloWorldType>("HelloWorld", AdvertiseOptions::new())
        .unwrap();
    println!("{:?} [P] Advertised topic", std::time::SystemTime::now());

    while !publisher.has_connections() {
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
    println!("{:?} [P] Matched with subscriber", std::time::SystemTime::now());

    let hello_world = HelloWorldType {
        id: 8,
        msg: "Hello world!".to_string(),
    };
    publisher.publish(&hello_world);

    std::thread::sleep(std::time::Duration::from_secs(5));
}
