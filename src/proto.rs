//! Generated protobuf messages and gRPC stubs for the `kvstore` package.

tonic::include_proto!("kvstore");
